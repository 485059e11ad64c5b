//! Error types for the audio HAL.
//!
//! Errors are split into three layers:
//! - **HAL errors** ([`HalError`]): returned by every fallible facade and stream call
//! - **Driver errors** ([`PcmError`], [`MixerError`]): reported by driver backends
//! - **Recoverable events**: standby transitions and I/O failures surfaced via
//!   [`EventCallback`](crate::EventCallback)
//!
//! Control-write failures inside routing never become errors; they are logged
//! and the remaining controls are still applied.

use crate::config::{StreamParams, StreamRequest};

/// Errors returned by the hardware facade and its streams.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// The hardware (or the stream's owning hardware) is not initialized.
    ///
    /// Returned when the mixer could not be opened, when a stream outlives its
    /// hardware, or when a stream is used after it was closed.
    #[error("audio hardware not initialized")]
    NotInitialized,

    /// The operation is not allowed in the current state.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation was rejected.
        reason: String,
    },

    /// The requested stream configuration is not supported.
    ///
    /// `supported` carries the nearest configuration the stream accepts, so
    /// the caller can retry with it.
    #[error("unsupported stream config {requested:?} (supported: {supported:?})")]
    UnsupportedConfig {
        /// What the caller asked for.
        requested: StreamRequest,
        /// The closest configuration the stream supports.
        supported: StreamParams,
    },

    /// A parameter was malformed or not recognized.
    #[error("bad value: {reason}")]
    BadValue {
        /// Description of the offending value.
        reason: String,
    },

    /// A required driver was not supplied to the builder.
    #[error("missing driver: {name} (configure it on the builder)")]
    MissingDriver {
        /// Which driver is missing.
        name: &'static str,
    },

    /// The mixer driver failed.
    #[error("mixer error: {0}")]
    Mixer(#[from] MixerError),

    /// The PCM driver failed.
    #[error("pcm error: {0}")]
    Pcm(#[from] PcmError),
}

impl HalError {
    /// Creates an invalid operation error with the given reason.
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Creates a bad value error with the given reason.
    pub fn bad_value(reason: impl Into<String>) -> Self {
        Self::BadValue {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a [`PcmDriver`](crate::driver::PcmDriver) or an open PCM.
#[derive(Debug, thiserror::Error)]
pub enum PcmError {
    /// The PCM device could not be opened.
    #[error("cannot open pcm: {reason}")]
    OpenFailed {
        /// Why the open failed.
        reason: String,
    },

    /// The device opened but is not ready for I/O.
    #[error("pcm not ready")]
    NotReady,

    /// A read or write did not complete.
    #[error("pcm transfer failed: {reason}")]
    Transfer {
        /// Description of what went wrong.
        reason: String,
    },

    /// The device went away while it was open.
    #[error("pcm disconnected")]
    Disconnected,
}

impl PcmError {
    /// Creates an open failed error with the given reason.
    pub fn open_failed(reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            reason: reason.into(),
        }
    }

    /// Creates a transfer error with the given reason.
    pub fn transfer(reason: impl Into<String>) -> Self {
        Self::Transfer {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a [`MixerDriver`](crate::driver::MixerDriver) or an open mixer.
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    /// The mixer device could not be opened.
    #[error("failed to open mixer: {reason}")]
    OpenFailed {
        /// Why the open failed.
        reason: String,
    },

    /// The control exists but refused the value.
    #[error("control '{control}' rejected value: {reason}")]
    Rejected {
        /// Name of the control.
        control: String,
        /// What the driver reported.
        reason: String,
    },
}

impl MixerError {
    /// Creates an open failed error with the given reason.
    pub fn open_failed(reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            reason: reason.into(),
        }
    }

    /// Creates a rejected error for the given control.
    pub fn rejected(control: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            control: control.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleFormat;

    #[test]
    fn test_hal_error_display() {
        let err = HalError::invalid_operation("output stream already open");
        assert_eq!(
            err.to_string(),
            "invalid operation: output stream already open"
        );
    }

    #[test]
    fn test_unsupported_config_reports_supported() {
        let err = HalError::UnsupportedConfig {
            requested: StreamRequest {
                sample_rate: Some(12000),
                ..Default::default()
            },
            supported: StreamParams {
                format: SampleFormat::Pcm16,
                channels: 2,
                sample_rate: 11025,
            },
        };
        let text = err.to_string();
        assert!(text.contains("12000"));
        assert!(text.contains("11025"));
    }

    #[test]
    fn test_pcm_error_converts_into_hal_error() {
        let err: HalError = PcmError::transfer("short write").into();
        assert!(matches!(err, HalError::Pcm(PcmError::Transfer { .. })));
        assert_eq!(err.to_string(), "pcm error: pcm transfer failed: short write");
    }

    #[test]
    fn test_mixer_error_rejected() {
        let err = MixerError::rejected("Speaker Switch", "out of range");
        assert_eq!(
            err.to_string(),
            "control 'Speaker Switch' rejected value: out of range"
        );
    }
}
