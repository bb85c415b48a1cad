//! Cooperative cancellation for long-running stream tasks.
//!
//! An [`AbortHandle`] is shared between the owner of a background task and
//! the task itself. The owner signals once; every `.await` wrapped in
//! [`until_aborted`] returns early.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("aborted")]
pub struct Aborted;

/// A cooperative abort handle. Clones share the same signal.
///
/// `abort()` may be called before anyone waits; the flag is checked on
/// every `wait()`.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Resolves once `abort()` has been called.
    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so an abort in between is not missed.
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Guard that aborts this handle when dropped.
    pub fn drop_guard(&self) -> AbortOnDrop {
        AbortOnDrop(self.clone())
    }
}

/// Aborts the wrapped handle on drop.
#[derive(Debug)]
pub struct AbortOnDrop(AbortHandle);

impl AbortOnDrop {
    pub fn handle(&self) -> &AbortHandle {
        &self.0
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `task` unless `abort` fires first, in which case the task is dropped.
pub async fn until_aborted<T, F>(task: F, abort: &AbortHandle) -> Result<T, Aborted>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = abort.wait() => Err(Aborted),
        result = task => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn abort_wakes_waiters() {
        let handle = AbortHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle.wait().await;
                true
            })
        };

        tokio::task::yield_now().await;
        handle.abort();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn completed_task_returns_its_value() {
        let handle = AbortHandle::new();
        assert_eq!(until_aborted(async { 42 }, &handle).await, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_task_is_cut_short() {
        let handle = AbortHandle::new();
        handle.abort();
        let result = until_aborted(tokio::time::sleep(Duration::from_secs(3600)), &handle).await;
        assert_eq!(result, Err(Aborted));
    }

    #[test]
    fn guard_aborts_on_drop() {
        let handle = AbortHandle::new();
        let guard = handle.drop_guard();
        assert!(!guard.handle().is_aborted());
        drop(guard);
        assert!(handle.is_aborted());
    }
}
