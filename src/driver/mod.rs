//! Driver interfaces the HAL core talks to.
//!
//! The core never touches kernel nodes directly. It opens PCMs through a
//! [`PcmDriver`], writes controls through a [`Mixer`], and holds the system
//! awake through a [`WakeLock`]. [`mock`] provides in-memory versions of all
//! three for tests and hardware-free use.

#[cfg(feature = "cpal-backend")]
mod cpal_pcm;
pub mod mock;

#[cfg(feature = "cpal-backend")]
pub use cpal_pcm::CpalPcmDriver;

use crate::config::{PCM_PERIOD_COUNT_MIN, PCM_PERIOD_SIZE_MIN};
use crate::{MixerError, PcmError};

/// Opaque handle to a mixer control, valid for the mixer that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub usize);

/// An open hardware mixer.
pub trait Mixer: Send {
    /// Looks up a control by name.
    fn control(&mut self, name: &str) -> Option<ControlId>;

    /// Selects a mux option by name.
    fn select(&mut self, control: ControlId, option: &str) -> Result<(), MixerError>;

    /// Writes a raw integer value.
    fn set_value(&mut self, control: ControlId, value: i32) -> Result<(), MixerError>;
}

/// Opens the hardware mixer.
pub trait MixerDriver: Send + Sync {
    /// Opens the mixer device.
    fn open(&self) -> Result<Box<dyn Mixer>, MixerError>;
}

/// Direction of a PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcmDirection {
    /// Playback.
    Output,
    /// Capture.
    Input,
}

/// Which hardware interface a PCM is opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcmPath {
    /// The codec's main audio interface.
    Codec,
    /// The Bluetooth SCO interface.
    Bluetooth,
}

/// Parameters for opening a PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmConfig {
    /// Playback or capture.
    pub direction: PcmDirection,
    /// Interface to open.
    pub path: PcmPath,
    /// Period size in frames.
    pub period_size: u32,
    /// Number of periods in the kernel buffer.
    pub period_count: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl PcmConfig {
    /// Configuration for the Bluetooth SCO link: narrowband mono at the
    /// driver's minimum period layout.
    #[must_use]
    pub fn bluetooth(direction: PcmDirection) -> Self {
        Self {
            direction,
            path: PcmPath::Bluetooth,
            period_size: PCM_PERIOD_SIZE_MIN,
            period_count: PCM_PERIOD_COUNT_MIN,
            channels: 1,
            sample_rate: 8000,
        }
    }

    /// Returns the size of one PCM16 frame in bytes.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * 2
    }
}

/// An open PCM device. Dropping it closes the device.
pub trait Pcm: Send {
    /// Returns true if the device is ready for I/O.
    fn is_ready(&self) -> bool;

    /// Starts the device without transferring data.
    ///
    /// Used for side links such as Bluetooth SCO that only need to run.
    fn start(&mut self) -> Result<(), PcmError> {
        Ok(())
    }

    /// Writes all of `data`, blocking until the device accepted it.
    fn write(&mut self, data: &[u8]) -> Result<(), PcmError>;

    /// Fills all of `data`, blocking until the device delivered it.
    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError>;
}

/// Opens PCM devices.
pub trait PcmDriver: Send + Sync {
    /// Opens a PCM with the given configuration.
    fn open(&self, config: &PcmConfig) -> Result<Box<dyn Pcm>, PcmError>;
}

/// Keeps the system awake while a stream is active.
pub trait WakeLock: Send + Sync {
    /// Acquires the lock named `tag`.
    fn acquire(&self, tag: &str);

    /// Releases the lock named `tag`.
    fn release(&self, tag: &str);
}

/// A [`WakeLock`] that does nothing, for platforms without power management.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&self, _tag: &str) {}

    fn release(&self, _tag: &str) {}
}
