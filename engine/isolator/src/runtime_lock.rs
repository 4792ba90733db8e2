//! Reentrant gate around an embedded scripting runtime.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;

/// Handle to the global runtime lock. Clones share one underlying lock.
///
/// Isolated actions that call into an embedded runtime take the lock around
/// those calls only. The guard releases on drop, so an abandoned action
/// frees the lock the moment it returns; the thread waiting on an isolated
/// action must never hold it across the wait.
#[derive(Clone, Default)]
pub struct RuntimeLock {
    inner: Arc<ReentrantMutex<()>>,
}

impl RuntimeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the runtime is available. Reentrant within one thread.
    pub fn acquire(&self) -> RuntimeGuard<'_> {
        RuntimeGuard { _guard: self.inner.lock() }
    }

    /// Non-blocking variant; `None` while another thread holds the runtime.
    pub fn try_acquire(&self) -> Option<RuntimeGuard<'_>> {
        self.inner.try_lock().map(|guard| RuntimeGuard { _guard: guard })
    }
}

/// Access to the runtime for the guard's lifetime.
pub struct RuntimeGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolator::Isolator;
    use crossbeam::channel::bounded;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn reentrant_within_one_thread() {
        let lock = RuntimeLock::new();
        let _outer = lock.acquire();
        let _inner = lock.acquire();
    }

    #[test]
    fn clones_contend_for_the_same_lock() {
        let lock = RuntimeLock::new();
        let clone = lock.clone();
        let guard = lock.acquire();

        let holder = thread::spawn(move || clone.try_acquire().is_none());
        assert!(holder.join().unwrap());
        drop(guard);
    }

    #[test]
    fn abandoned_action_releases_the_lock_when_it_returns() {
        let isolator = Isolator::new();
        let lock = RuntimeLock::new();
        let action_lock = lock.clone();
        let (acquired_tx, acquired_rx) = bounded(1);

        let result: Result<(), _> =
            isolator.execute(Duration::from_millis(50), None, move |_| {
                let _guard = action_lock.acquire();
                let _ = acquired_tx.send(());
                thread::sleep(Duration::from_millis(300));
            });
        assert!(result.unwrap_err().is_timeout());

        // Held while the abandoned action is still running its tail.
        acquired_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(lock.try_acquire().is_none());

        // Freed by the guard drop once the action returns.
        thread::sleep(Duration::from_millis(400));
        assert!(lock.try_acquire().is_some());
    }
}
