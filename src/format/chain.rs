//! The capture transform chain of an input stream.

use super::channel_mixer::ChannelMixer;
use super::downsampler::DownSampler;
use super::provider::{BufferProvider, Stage};
use crate::config::{StreamParams, HW_CHANNELS, HW_SAMPLE_RATE};
use crate::{HalError, PcmError};

/// The stages between the raw capture PCM and the caller.
///
/// Built once per stream configuration: a channel mixer when the caller
/// wants mono, then a downsampler when the caller wants a lower rate.
#[derive(Debug, Default)]
pub struct CaptureChain {
    mixer: Option<ChannelMixer>,
    downsampler: Option<DownSampler>,
}

impl CaptureChain {
    /// Builds the chain delivering `params` from hardware capture, pulling
    /// at most `frame_count` frames per stage call.
    pub fn new(params: &StreamParams, frame_count: usize) -> Result<Self, HalError> {
        let mixer = if params.channels == HW_CHANNELS {
            None
        } else {
            Some(ChannelMixer::new(params.channels, HW_CHANNELS, frame_count)?)
        };

        let downsampler = if params.sample_rate == HW_SAMPLE_RATE {
            None
        } else {
            Some(DownSampler::new(params.sample_rate, params.channels, frame_count)?)
        };

        Ok(Self { mixer, downsampler })
    }

    /// Returns true if capture data passes through unchanged.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.mixer.is_none() && self.downsampler.is_none()
    }

    /// Discards state carried over from a previous capture session.
    pub fn reset(&mut self) {
        if let Some(downsampler) = &mut self.downsampler {
            downsampler.reset();
        }
    }

    /// Fills `out` with frames pulled from `raw` through every stage.
    pub fn pull(&mut self, raw: &mut dyn BufferProvider, out: &mut [i16]) -> Result<usize, PcmError> {
        match (&mut self.mixer, &mut self.downsampler) {
            (None, None) => raw.next_buffer(out),
            (Some(mixer), None) => mixer.pull(raw, out),
            (None, Some(downsampler)) => downsampler.pull(raw, out),
            (Some(mixer), Some(downsampler)) => downsampler.pull(&mut mixer.attach(raw), out),
        }
    }
}
