//! Taking a sibling stream's lock while holding the hardware lock.
//!
//! Stream locks order before the hardware lock, so a thread holding the
//! hardware lock has to let go of it to wait on a stream. While it waits,
//! another thread may close that stream, open a replacement, or put it to
//! standby. The hand-off re-validates both the stream's identity and its
//! standby generation after reacquiring, and starts over on any mismatch.

use std::sync::Arc;

use parking_lot::MutexGuard;

/// A stream that can be taken over by another thread.
pub(crate) trait HandoffTarget {
    /// Signals that another thread wants the stream lock and returns the
    /// current standby generation.
    fn prepare_lock(&self) -> u32;

    /// Returns the current standby generation.
    fn standby_generation(&self) -> u32;
}

/// A successfully handed-off stream and its held lock.
pub(crate) struct Handoff<T, G> {
    pub stream: Arc<T>,
    pub guard: G,
    pub retries: u32,
}

/// Locks the stream currently filling `role`, releasing `state` while waiting.
///
/// `reacquire` takes the stream's own lock. It runs with `state` unlocked and
/// may release further locks of its own, as long as it restores them before
/// returning. Returns `None` once `role` is empty.
pub(crate) fn acquire_with_handoff<S, T, G>(
    state: &mut MutexGuard<'_, S>,
    role: impl Fn(&S) -> Option<Arc<T>>,
    mut reacquire: impl FnMut(&Arc<T>) -> G,
) -> Option<Handoff<T, G>>
where
    T: HandoffTarget,
{
    let mut retries = 0;

    loop {
        let stream = role(&**state)?;
        let generation = stream.prepare_lock();

        let guard = MutexGuard::unlocked(state, || reacquire(&stream));

        let same_stream = role(&**state).is_some_and(|current| Arc::ptr_eq(&current, &stream));
        if same_stream && stream.standby_generation() == generation {
            return Some(Handoff {
                stream,
                guard,
                retries,
            });
        }

        drop(guard);
        retries += 1;
        tracing::debug!(retries, same_stream, "hand-off target changed, retrying");
    }
}
