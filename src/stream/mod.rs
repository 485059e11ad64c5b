//! Playback and capture streams.
//!
//! A stream sits in standby until its first transfer, opens its PCM on
//! demand and closes it again on [`standby`](OutputStream::standby), on a
//! mode change, or when its sibling needs the codec.
//!
//! Lock order is output stream, then input stream, then hardware. Methods
//! with an `_l` suffix expect the caller to hold the stream lock and the
//! hardware lock already.

mod handoff;
mod input;
mod output;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{ArcMutexGuard, RawMutex};

pub(crate) use handoff::{acquire_with_handoff, HandoffTarget};
pub use input::InputStream;
pub use output::OutputStream;

/// Wake lock tag held while the output stream is active.
pub const OUTPUT_WAKE_LOCK: &str = "AudioOutLock";

/// Wake lock tag held while an input stream is active.
pub const INPUT_WAKE_LOCK: &str = "AudioInLock";

/// A stream lock held through the stream's `Arc`.
pub(crate) type StreamGuard<T> = ArcMutexGuard<RawMutex, T>;

/// Lock-free state shared by both stream kinds.
#[derive(Debug)]
struct StreamFlags {
    standby: AtomicBool,
    generation: AtomicU32,
    sleep_req: AtomicBool,
    detached: AtomicBool,
}

impl StreamFlags {
    fn new() -> Self {
        Self {
            standby: AtomicBool::new(true),
            generation: AtomicU32::new(0),
            sleep_req: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }

    fn is_standby(&self) -> bool {
        self.standby.load(Ordering::Acquire)
    }

    /// Returns true if the flag changed.
    fn set_standby(&self, standby: bool) -> bool {
        self.standby.swap(standby, Ordering::AcqRel) != standby
    }

    fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn request_lock(&self) -> u32 {
        self.sleep_req.store(true, Ordering::Release);
        self.generation()
    }

    fn clear_request(&self) {
        self.sleep_req.store(false, Ordering::Release);
    }

    /// Sleeps for `delay` if another thread is waiting on the stream lock.
    fn yield_if_requested(&self, delay: Duration) {
        if self.sleep_req.load(Ordering::Acquire) {
            std::thread::sleep(delay);
        }
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}
