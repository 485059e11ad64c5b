//! Configuration types and hardware constants.

use std::time::Duration;

/// Smallest PCM period the kernel driver accepts, in frames.
pub const PCM_PERIOD_SIZE_MIN: u32 = 128;

/// Smallest PCM period count the kernel driver accepts.
pub const PCM_PERIOD_COUNT_MIN: u32 = 2;

/// Native codec sample rate for both playback and capture.
pub const HW_SAMPLE_RATE: u32 = 44100;

/// Native codec channel count for both playback and capture.
pub const HW_CHANNELS: u16 = 2;

/// Capture rates the input stream can deliver, ascending.
pub const SUPPORTED_INPUT_RATES: [u32; 5] = [8000, 11025, 16000, 22050, 44100];

/// Sample encoding of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian PCM.
    #[default]
    Pcm16,
    /// Unsigned 8-bit PCM.
    Pcm8,
}

impl SampleFormat {
    /// Returns the size of one sample in bytes.
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm16 => 2,
            Self::Pcm8 => 1,
        }
    }
}

/// A fully resolved stream configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Sample encoding.
    pub format: SampleFormat,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl StreamParams {
    /// The codec's native playback and capture format: 44.1kHz stereo PCM16.
    pub const HARDWARE: Self = Self {
        format: SampleFormat::Pcm16,
        channels: HW_CHANNELS,
        sample_rate: HW_SAMPLE_RATE,
    };

    /// Returns the size of one frame in bytes.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * self.format.bytes_per_sample()
    }

    /// Returns how long `bytes` worth of frames take to play at this rate.
    #[must_use]
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let frame_size = self.frame_size().max(1);
        let micros = (bytes as u64 * 1000 / frame_size as u64) * 1000 / u64::from(self.sample_rate.max(1));
        Duration::from_micros(micros)
    }
}

/// A stream configuration as requested by the caller.
///
/// `None` fields mean "use the stream's default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamRequest {
    /// Requested sample encoding.
    pub format: Option<SampleFormat>,
    /// Requested channel count.
    pub channels: Option<u16>,
    /// Requested sample rate in Hz.
    pub sample_rate: Option<u32>,
}

impl StreamRequest {
    /// Creates a request for the given rate and channel count in PCM16.
    #[must_use]
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            format: Some(SampleFormat::Pcm16),
            channels: Some(channels),
            sample_rate: Some(sample_rate),
        }
    }
}

/// Configuration for the audio hardware.
///
/// Use [`HalConfig::default()`] for the codec's stock settings, or customize
/// as needed.
///
/// # Example
///
/// ```
/// use asoc_audio_hal::HalConfig;
/// use std::time::Duration;
///
/// let config = HalConfig {
///     sleep_request_delay: Duration::from_millis(5),
///     ..Default::default()
/// };
/// assert_eq!(config.output_period_count, 4);
/// ```
#[derive(Debug, Clone)]
pub struct HalConfig {
    /// Playback period size in frames.
    ///
    /// Default: 1024 (8 × [`PCM_PERIOD_SIZE_MIN`])
    pub output_period_size: u32,

    /// Number of playback periods in the kernel buffer.
    ///
    /// Default: 4
    pub output_period_count: u32,

    /// Capture period size in frames, before downsampling.
    ///
    /// Default: 1024
    pub input_period_size: u32,

    /// Number of capture periods in the kernel buffer.
    ///
    /// Default: 4
    pub input_period_count: u32,

    /// Delay inserted before I/O when another thread asked for the stream lock.
    ///
    /// Must stay shorter than a route reconfiguration.
    /// Default: 10ms
    pub sleep_request_delay: Duration,

    /// Extra output latency added by the DSP and amplifier.
    ///
    /// Default: 0ms
    pub output_extra_latency: Duration,

    /// Attempts made to take the facade lock while dumping state.
    ///
    /// Default: 50
    pub dump_lock_retries: u32,

    /// Pause between dump lock attempts.
    ///
    /// Default: 20ms
    pub dump_lock_interval: Duration,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            output_period_size: PCM_PERIOD_SIZE_MIN * 8,
            output_period_count: 4,
            input_period_size: PCM_PERIOD_SIZE_MIN * 8,
            input_period_count: 4,
            sleep_request_delay: Duration::from_millis(10),
            output_extra_latency: Duration::ZERO,
            dump_lock_retries: 50,
            dump_lock_interval: Duration::from_millis(20),
        }
    }
}

impl HalConfig {
    /// Returns the playback buffer size in bytes (one period at the hardware format).
    #[must_use]
    pub fn output_buffer_bytes(&self) -> usize {
        self.output_period_size as usize * StreamParams::HARDWARE.frame_size()
    }
}

/// Returns the supported input rate closest to `requested`.
///
/// Rates are scanned in ascending order and the scan stops as soon as the
/// distance starts growing, so ties resolve to the lower rate.
#[must_use]
pub fn nearest_input_rate(requested: u32) -> u32 {
    let mut best = SUPPORTED_INPUT_RATES[0];
    let mut best_delta = u32::MAX;

    for &rate in &SUPPORTED_INPUT_RATES {
        let delta = rate.abs_diff(requested);
        if delta > best_delta {
            break;
        }
        best_delta = delta;
        best = rate;
    }

    best
}

/// Returns the decimation ratio between the hardware rate and `sample_rate`.
#[must_use]
pub fn decimation_ratio(sample_rate: u32) -> usize {
    match sample_rate {
        8000 | 11025 => 4,
        16000 | 22050 => 2,
        _ => 1,
    }
}

/// Returns the capture buffer size in bytes for one hardware period.
///
/// Returns 0 for anything other than PCM16 with 1 or 2 channels at one of
/// [`SUPPORTED_INPUT_RATES`].
#[must_use]
pub fn input_buffer_size(
    period_size: u32,
    sample_rate: u32,
    format: SampleFormat,
    channels: u16,
) -> usize {
    if format != SampleFormat::Pcm16 {
        tracing::warn!(?format, "input buffer size: bad format");
        return 0;
    }
    if !(1..=2).contains(&channels) {
        tracing::warn!(channels, "input buffer size: bad channel count");
        return 0;
    }
    if !SUPPORTED_INPUT_RATES.contains(&sample_rate) {
        tracing::error!(sample_rate, "input buffer size: bad sample rate");
        return 0;
    }

    period_size as usize * usize::from(channels) * format.bytes_per_sample()
        / decimation_ratio(sample_rate)
}
