//! In-flight driver call tracking for state dumps.
//!
//! Each component that talks to a driver owns a [`DriverTrace`] and wraps
//! its raw driver calls with [`DriverTrace::call`]. A dump taken while a
//! thread is stuck inside the driver then shows which call it is stuck in.

use std::sync::atomic::{AtomicU8, Ordering};

/// A raw driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DriverOp {
    /// No driver call in flight.
    #[default]
    None = 0,
    /// Opening a PCM.
    PcmOpen = 1,
    /// Closing a PCM.
    PcmClose = 2,
    /// Writing to a PCM.
    PcmWrite = 3,
    /// Reading from a PCM.
    PcmRead = 4,
    /// Opening the mixer.
    MixerOpen = 5,
    /// Closing the mixer.
    MixerClose = 6,
    /// Looking up a mixer control.
    MixerGet = 7,
    /// Writing a mixer control.
    MixerSet = 8,
}

impl DriverOp {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::PcmOpen,
            2 => Self::PcmClose,
            3 => Self::PcmWrite,
            4 => Self::PcmRead,
            5 => Self::MixerOpen,
            6 => Self::MixerClose,
            7 => Self::MixerGet,
            8 => Self::MixerSet,
            _ => Self::None,
        }
    }
}

/// The driver call currently in flight for one component.
#[derive(Debug, Default)]
pub struct DriverTrace {
    op: AtomicU8,
}

impl DriverTrace {
    /// Returns the call in flight, or [`DriverOp::None`].
    pub fn current(&self) -> DriverOp {
        DriverOp::from_raw(self.op.load(Ordering::Relaxed))
    }

    /// Runs `f` with `op` recorded as in flight.
    pub fn call<R>(&self, op: DriverOp, f: impl FnOnce() -> R) -> R {
        self.op.store(op as u8, Ordering::Relaxed);
        let result = f();
        self.op.store(DriverOp::None as u8, Ordering::Relaxed);
        result
    }
}
