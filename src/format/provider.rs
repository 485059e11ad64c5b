//! Pull-based sample providers.
//!
//! Capture data flows from the PCM through zero or more [`Stage`]s to the
//! caller. Every link in that chain exposes the same operation: fill this
//! buffer with as many frames as you can.

use crate::PcmError;

/// A source of interleaved PCM16 frames.
pub trait BufferProvider {
    /// Fills the front of `out` and returns the number of frames written.
    ///
    /// `out.len()` is a whole number of frames at the provider's channel
    /// count. Returning fewer frames than requested is allowed; returning
    /// zero means the provider has nothing to give right now.
    fn next_buffer(&mut self, out: &mut [i16]) -> Result<usize, PcmError>;
}

/// A transform that pulls its input from an upstream provider.
pub trait Stage {
    /// Fills `out` with transformed frames pulled from `upstream`.
    fn pull(&mut self, upstream: &mut dyn BufferProvider, out: &mut [i16]) -> Result<usize, PcmError>;

    /// Binds this stage to `upstream`, producing a provider.
    fn attach<'a>(&'a mut self, upstream: &'a mut dyn BufferProvider) -> Attached<'a, Self>
    where
        Self: Sized,
    {
        Attached {
            stage: self,
            upstream,
        }
    }
}

/// A [`Stage`] bound to its upstream provider.
pub struct Attached<'a, S> {
    stage: &'a mut S,
    upstream: &'a mut dyn BufferProvider,
}

impl<S: Stage> BufferProvider for Attached<'_, S> {
    fn next_buffer(&mut self, out: &mut [i16]) -> Result<usize, PcmError> {
        self.stage.pull(self.upstream, out)
    }
}

/// Provides a constant value on every channel, without end.
#[cfg(test)]
pub(crate) struct Constant {
    pub values: Vec<i16>,
}

#[cfg(test)]
impl BufferProvider for Constant {
    fn next_buffer(&mut self, out: &mut [i16]) -> Result<usize, PcmError> {
        let channels = self.values.len();
        for frame in out.chunks_exact_mut(channels) {
            frame.copy_from_slice(&self.values);
        }
        Ok(out.len() / channels)
    }
}

/// Provides the given samples once, at most `chunk` frames per call.
#[cfg(test)]
pub(crate) struct Scripted {
    pub samples: Vec<i16>,
    pub channels: usize,
    pub chunk: usize,
    pub pos: usize,
}

#[cfg(test)]
impl BufferProvider for Scripted {
    fn next_buffer(&mut self, out: &mut [i16]) -> Result<usize, PcmError> {
        let left = (self.samples.len() - self.pos) / self.channels;
        let frames = (out.len() / self.channels).min(self.chunk).min(left);
        let n = frames * self.channels;
        out[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(frames)
    }
}
