//! Stereo to mono downmix.

use super::provider::{BufferProvider, Stage};
use crate::{HalError, PcmError};

/// Averages the two channels of a stereo upstream into mono.
#[derive(Debug)]
pub struct ChannelMixer {
    frame_count: usize,
    scratch: Vec<i16>,
}

impl ChannelMixer {
    /// Creates a mixer pulling at most `frame_count` frames per call.
    ///
    /// Only the 2 to 1 reduction is supported.
    pub fn new(out_channels: u16, in_channels: u16, frame_count: usize) -> Result<Self, HalError> {
        if out_channels != 1 || in_channels != 2 {
            tracing::error!(in_channels, out_channels, "channel mixer: bad conversion");
            return Err(HalError::bad_value(format!(
                "cannot mix {in_channels} channels into {out_channels}"
            )));
        }

        Ok(Self {
            frame_count,
            scratch: vec![0; frame_count * 2],
        })
    }
}

impl Stage for ChannelMixer {
    fn pull(&mut self, upstream: &mut dyn BufferProvider, out: &mut [i16]) -> Result<usize, PcmError> {
        let frames = out.len().min(self.frame_count);
        let got = upstream.next_buffer(&mut self.scratch[..frames * 2])?;

        for (sample, pair) in out.iter_mut().zip(self.scratch.chunks_exact(2)).take(got) {
            *sample = ((i32::from(pair[0]) + i32::from(pair[1])) / 2) as i16;
        }

        Ok(got)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::provider::{Constant, Scripted};

    #[test]
    fn test_only_stereo_to_mono() {
        assert!(ChannelMixer::new(1, 2, 64).is_ok());
        assert!(matches!(
            ChannelMixer::new(2, 1, 64),
            Err(HalError::BadValue { .. })
        ));
        assert!(ChannelMixer::new(1, 1, 64).is_err());
    }

    #[test]
    fn test_averages_with_truncation() {
        let mut mixer = ChannelMixer::new(1, 2, 64).unwrap();
        let mut source = Scripted {
            samples: vec![100, 200, 1000, -1000, -3, 0, 32767, 32767],
            channels: 2,
            chunk: 64,
            pos: 0,
        };

        let mut out = [0i16; 4];
        assert_eq!(mixer.pull(&mut source, &mut out).unwrap(), 4);
        // -3 / 2 truncates towards zero
        assert_eq!(out, [150, 0, -1, 32767]);
    }

    #[test]
    fn test_limited_to_frame_count() {
        let mut mixer = ChannelMixer::new(1, 2, 8).unwrap();
        let mut source = Constant { values: vec![4, 6] };

        let mut out = [0i16; 32];
        assert_eq!(mixer.pull(&mut source, &mut out).unwrap(), 8);
        assert!(out[..8].iter().all(|&s| s == 5));
        assert!(out[8..].iter().all(|&s| s == 0));
    }
}
