//! Fixed-point capture downsampler from the 44.1kHz hardware rate.
//!
//! The rate is reduced by a cascade of steps. Each step either halves the
//! rate with a 20-tap half-band FIR, or converts 441 frames into 320 with a
//! 24-tap low-pass FIR followed by linear interpolation. 22050 and 11025 Hz
//! use only halving; 16000 and 8000 Hz finish with the rational step.
//!
//! Every step keeps a work buffer of pending input frames, so partial
//! blocks carry over between pulls.

use super::provider::{BufferProvider, Stage};
use crate::config::HW_SAMPLE_RATE;
use crate::{HalError, PcmError};

/// Half-band low-pass taps in Q30, for any 2:1 reduction.
const HALF_BAND_TAPS: [i32; 20] = [
    2_089_257, 2_898_328, -5_820_678, -10_484_531, 19_038_724, 30_542_725, -50_469_415,
    -81_505_260, 152_544_464, 478_517_512, 478_517_512, 152_544_464, -81_505_260, -50_469_415,
    30_542_725, 19_038_724, -10_484_531, -5_820_678, 2_898_328, 2_089_257,
];

/// Low-pass taps in Q30 ahead of the 441:320 interpolation.
const RATIONAL_TAPS: [i32; 24] = [
    2_057_290, -2_973_608, 1_880_478, 4_362_037, -14_639_744, 18_523_609, -1_609_189,
    -38_502_470, 78_073_125, -68_353_935, -59_103_896, 617_555_440, 617_555_440, -59_103_896,
    -68_353_935, 78_073_125, -38_502_470, -1_609_189, 18_523_609, -14_639_744, 4_362_037,
    1_880_478, -2_973_608, 2_057_290,
];

const RATIONAL_IN: usize = 441;
const RATIONAL_OUT: usize = 320;

/// Interpolation phase step, 441/320 in Q15.
const RATIONAL_STEP: u32 = 45158;

/// Output rates the downsampler accepts.
pub const DOWNSAMPLER_RATES: [u32; 4] = [8000, 11025, 16000, 22050];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Halve,
    Rational,
}

impl Step {
    /// Runs the step over the `frames` frames of `input`, appending output
    /// frames to `output`. Returns the number of input frames consumed.
    fn run(self, input: &[i16], frames: usize, channels: usize, output: &mut Vec<i16>) -> usize {
        match self {
            Self::Halve => halve(input, frames, channels, output),
            Self::Rational => rational(input, frames, channels, output),
        }
    }

    fn apply_rate(self, rate: u32) -> u32 {
        match self {
            Self::Halve => rate / 2,
            Self::Rational => rate * RATIONAL_OUT as u32 / RATIONAL_IN as u32,
        }
    }
}

/// Convolves `taps` with every `stride`-th sample of `input` from `start`.
///
/// Samples are Q15 and taps Q30; the taps are truncated to Q14 first so the
/// sum fits in 32 bits. The result is rounded back to Q15 but not clipped.
fn fir(input: &[i16], start: usize, stride: usize, taps: &[i32]) -> i32 {
    let mut sum: i32 = 1 << 13;
    for (i, &tap) in taps.iter().enumerate() {
        sum += i32::from(input[start + i * stride]) * (tap >> 16);
    }
    sum >> 14
}

fn clip(x: i32) -> i16 {
    x.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn halve(input: &[i16], frames: usize, channels: usize, output: &mut Vec<i16>) -> usize {
    let taps = HALF_BAND_TAPS.len();
    if frames < taps {
        return 0;
    }

    let odd = frames & 1;
    let consumed = frames - odd - (taps - 2);
    let produced = consumed / 2;

    let base = output.len();
    output.resize(base + produced * channels, 0);
    for k in 0..produced {
        for c in 0..channels {
            let sum = fir(input, 2 * k * channels + c, channels, &HALF_BAND_TAPS);
            output[base + k * channels + c] = clip(sum);
        }
    }

    consumed
}

fn rational(input: &[i16], frames: usize, channels: usize, output: &mut Vec<i16>) -> usize {
    let overlap = RATIONAL_TAPS.len() - 1;
    if frames < overlap {
        return 0;
    }
    let blocks = (frames - overlap) / RATIONAL_IN;

    let mut filtered = [0i32; RATIONAL_IN];
    for block in 0..blocks {
        let base = output.len();
        output.resize(base + RATIONAL_OUT * channels, 0);

        for c in 0..channels {
            for (j, slot) in filtered.iter_mut().enumerate() {
                let start = (block * RATIONAL_IN + j) * channels + c;
                *slot = fir(input, start, channels, &RATIONAL_TAPS);
            }

            let mut pos: u32 = 0;
            for j in 0..RATIONAL_OUT {
                let whole = (pos >> 15) as usize;
                let frac = i64::from(pos & 0x7fff);
                let s1 = i64::from(filtered[whole]);
                let s2 = i64::from(filtered[whole + 1]);
                let value = s1 + (((s2 - s1) * frac) >> 15);
                output[base + j * channels + c] = clip(value as i32);
                pos += RATIONAL_STEP;
            }
        }
    }

    blocks * RATIONAL_IN
}

/// Converts 44.1kHz capture to a lower rate.
#[derive(Debug)]
pub struct DownSampler {
    sample_rate: u32,
    channels: usize,
    frame_count: usize,
    steps: Vec<Step>,
    /// Pending interleaved frames; `buffers[i]` feeds `steps[i]`, the last
    /// one holds output not yet handed to the caller.
    buffers: Vec<Vec<i16>>,
}

impl DownSampler {
    /// Creates a downsampler to `sample_rate` for `channels` interleaved
    /// channels, pulling at most `frame_count` frames per upstream call.
    pub fn new(sample_rate: u32, channels: u16, frame_count: usize) -> Result<Self, HalError> {
        if !DOWNSAMPLER_RATES.contains(&sample_rate) {
            tracing::error!(sample_rate, "downsampler: bad sample rate");
            return Err(HalError::bad_value(format!(
                "cannot downsample to {sample_rate} Hz"
            )));
        }
        if !(1..=2).contains(&channels) {
            return Err(HalError::bad_value(format!(
                "cannot downsample {channels} channels"
            )));
        }

        let mut steps = Vec::new();
        let mut rate = HW_SAMPLE_RATE;
        while rate > sample_rate {
            let step = if 2 * sample_rate <= rate {
                Step::Halve
            } else {
                Step::Rational
            };
            rate = step.apply_rate(rate);
            steps.push(step);
        }

        tracing::debug!(sample_rate, channels, frame_count, ?steps, "downsampler created");

        Ok(Self {
            sample_rate,
            channels: usize::from(channels),
            frame_count,
            buffers: vec![Vec::new(); steps.len() + 1],
            steps,
        })
    }

    /// Returns the output sample rate.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Discards all pending frames.
    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
    }

    /// Moves as many pending output frames as fit into `out`.
    fn drain(&mut self, out: &mut [i16]) -> usize {
        let Some(pending) = self.buffers.last_mut() else {
            return 0;
        };
        let n = pending.len().min(out.len());
        let n = n - n % self.channels;
        out[..n].copy_from_slice(&pending[..n]);
        pending.drain(..n);
        n / self.channels
    }

    /// Pulls one chunk from `upstream` into the first work buffer.
    fn fill(&mut self, upstream: &mut dyn BufferProvider) -> Result<usize, PcmError> {
        let channels = self.channels;
        let head = &mut self.buffers[0];
        let filled = head.len() / channels;
        if filled >= self.frame_count {
            return Ok(0);
        }

        head.resize(self.frame_count * channels, 0);
        match upstream.next_buffer(&mut head[filled * channels..]) {
            Ok(got) => {
                head.truncate((filled + got) * channels);
                Ok(got)
            }
            Err(e) => {
                head.truncate(filled * channels);
                Err(e)
            }
        }
    }

    fn run_steps(&mut self) {
        let channels = self.channels;
        for (i, step) in self.steps.iter().enumerate() {
            let (before, after) = self.buffers.split_at_mut(i + 1);
            let input = &mut before[i];
            let output = &mut after[0];

            let frames = input.len() / channels;
            let consumed = step.run(input, frames, channels, output);
            input.drain(..consumed * channels);
        }
    }
}

impl Stage for DownSampler {
    fn pull(&mut self, upstream: &mut dyn BufferProvider, out: &mut [i16]) -> Result<usize, PcmError> {
        let wanted = out.len() / self.channels;
        let mut produced = self.drain(out);

        while produced < wanted {
            if self.fill(upstream)? == 0 {
                break;
            }
            self.run_steps();
            produced += self.drain(&mut out[produced * self.channels..]);
        }

        Ok(produced)
    }
}
