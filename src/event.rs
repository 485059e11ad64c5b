//! Runtime events for monitoring stream and routing state.
//!
//! Events are non-fatal notifications. The hardware keeps running after
//! any event is emitted - they're for logging/metrics, not error handling.

use std::sync::Arc;

use crate::device::AudioMode;

/// Which stream an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// The playback stream.
    Output,
    /// A capture stream.
    Input,
}

/// Runtime events emitted by the hardware and its streams.
///
/// # Example
///
/// ```
/// use asoc_audio_hal::HalEvent;
///
/// fn handle_event(event: HalEvent) {
///     match event {
///         HalEvent::StandbyEntered { stream } => eprintln!("{stream:?} in standby"),
///         HalEvent::StandbyExited { stream } => eprintln!("{stream:?} active"),
///         HalEvent::HandoffRetried { stream, attempts } => {
///             eprintln!("{stream:?} hand-off retried {attempts} times")
///         }
///         HalEvent::ModeChanged { previous, current } => {
///             eprintln!("mode {previous:?} -> {current:?}")
///         }
///         HalEvent::IoError { stream, error } => eprintln!("{stream:?} I/O error: {error}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum HalEvent {
    /// A stream closed its PCM and released its wake lock.
    StandbyEntered {
        /// The stream that went to standby.
        stream: StreamKind,
    },

    /// A stream opened its PCM and acquired its wake lock.
    StandbyExited {
        /// The stream that became active.
        stream: StreamKind,
    },

    /// A lock hand-off found a replaced or re-standby'd stream and retried.
    ///
    /// Happens when another thread swapped the active stream while the
    /// facade lock was released.
    HandoffRetried {
        /// Role of the stream being handed off.
        stream: StreamKind,
        /// Number of retries before the hand-off settled.
        attempts: u32,
    },

    /// The audio mode changed.
    ModeChanged {
        /// Mode before the change.
        previous: AudioMode,
        /// Mode after the change.
        current: AudioMode,
    },

    /// A read or write failed; the stream was forced to standby.
    IoError {
        /// The stream that failed.
        stream: StreamKind,
        /// Description of the error.
        error: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`AudioHardwareBuilder::on_event()`].
///
/// [`AudioHardwareBuilder::on_event()`]: crate::AudioHardwareBuilder::on_event
pub type EventCallback = Arc<dyn Fn(HalEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use asoc_audio_hal::{event_callback, HalEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(HalEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Emits `event` if a callback is registered.
pub(crate) fn emit(callback: Option<&EventCallback>, event: HalEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_event_debug() {
        let event = HalEvent::HandoffRetried {
            stream: StreamKind::Input,
            attempts: 2,
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("HandoffRetried"));
        assert!(debug.contains("Input"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            HalEvent::StandbyEntered {
                stream: StreamKind::Output,
            },
        );
        assert!(called.load(Ordering::SeqCst));
    }
}
