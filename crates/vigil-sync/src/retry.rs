//! Single-slot scheduled task.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Holds at most one pending scheduled task.
///
/// Scheduling always cancels the previously pending task, so a timer owner
/// can never accumulate duplicate timers. The pending task is also aborted
/// when the timer is dropped.
#[derive(Default)]
pub struct RetryTimer {
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl RetryTimer {
    /// Create an empty timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, cancelling any previously scheduled task.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if let Some(previous) = self.slot.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending task, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.slot.lock().take() {
            handle.abort();
        }
    }

    /// Whether a task is scheduled and has not run yet.
    pub fn is_scheduled(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_task_fires_after_delay() {
        let timer = RetryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        timer.schedule(Duration::from_secs(5), async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_scheduled());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cancels_previous_task() {
        let timer = RetryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        timer.schedule(Duration::from_secs(5), async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let f = fired.clone();
        timer.schedule(Duration::from_secs(10), async move {
            f.fetch_add(100, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let timer = RetryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        timer.schedule(Duration::from_secs(5), async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_scheduled());
    }
}
