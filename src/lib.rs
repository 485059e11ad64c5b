//! # asoc-audio-hal
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Audio routing and stream lifecycle for an ASoC codec.
//!
//! `asoc-audio-hal` drives a codec through two narrow driver seams: a mixer
//! for pin and gain controls, and a PCM driver for data. On top of those it
//! provides a playback stream, capture streams with mono downmix and
//! downsampling, call-mode routing, mic mute, and volume balancing between
//! media and voice.
//!
//! ## Quick Start
//!
//! ```
//! use asoc_audio_hal::driver::mock::{MockPcmDriver, VirtualMixer};
//! use asoc_audio_hal::{AudioDevices, AudioHardware, AudioMode, StreamRequest};
//!
//! let hw = AudioHardware::builder()
//!     .mixer(VirtualMixer::new())
//!     .pcm(MockPcmDriver::new())
//!     .on_event(|e| tracing::info!(?e, "hal event"))
//!     .build()?;
//!
//! let out = hw.open_output_stream(AudioDevices::OUT_SPEAKER, StreamRequest::default())?;
//! out.write(&vec![0u8; out.buffer_size()])?;
//!
//! hw.set_mode(AudioMode::InCall)?;
//! hw.set_incall_path(AudioDevices::OUT_SPEAKER)?;
//! # Ok::<(), asoc_audio_hal::HalError>(())
//! ```
//!
//! ## Architecture
//!
//! Threads call in concurrently: a playback thread writing, capture threads
//! reading, and a control thread changing mode, routing and volume.
//!
//! - **Streams** open their PCM lazily and drop to standby on demand
//! - **Hand-off** moves the codec between streams without lock inversion
//! - **Router** applies pin tables and gains, always under the hardware lock
//!
//! Locks are taken output stream first, then input stream, then hardware.

// unsafe_code lint is configured in Cargo.toml as "deny"
#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod device;
pub mod driver;
mod error;
mod event;
pub mod format;
mod hardware;
mod params;
pub mod routing;
mod stream;
mod trace;

pub use builder::AudioHardwareBuilder;
pub use config::{
    decimation_ratio, input_buffer_size, nearest_input_rate, HalConfig, SampleFormat,
    StreamParams, StreamRequest, HW_CHANNELS, HW_SAMPLE_RATE, PCM_PERIOD_COUNT_MIN,
    PCM_PERIOD_SIZE_MIN, SUPPORTED_INPUT_RATES,
};
pub use device::{AudioDevices, AudioMode};
pub use error::{HalError, MixerError, PcmError};
pub use event::{event_callback, EventCallback, HalEvent, StreamKind};
pub use hardware::AudioHardware;
pub use params::{ParamBag, KEY_ROUTING};
pub use stream::{InputStream, OutputStream, INPUT_WAKE_LOCK, OUTPUT_WAKE_LOCK};
pub use trace::{DriverOp, DriverTrace};
