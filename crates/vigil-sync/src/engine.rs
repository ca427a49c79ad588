//! Decision synchronization engine.
//!
//! Drains the encrypted decision queue to the remote authority as a single
//! batch. State machine: `Idle -> Syncing -> {Success -> Idle, Fail ->
//! BackoffWait -> Syncing}`. Execution is single-flight: overlapping callers
//! collapse into the one in-flight attempt, which is the only mutual
//! exclusion the sync core needs.
//!
//! A failed attempt schedules exactly one retry and returns to `Idle`, so an
//! external trigger (a realtime message, a foreground event) may legitimately
//! re-enter `sync()` before the timer fires; whichever attempt succeeds first
//! wins and the queue empties atomically.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use vigil_core::effects::{CredentialProvider, DecisionSink};
use vigil_core::{Event, EventBus, Result, VigilError};
use vigil_store::DecisionQueue;

use crate::backoff::{self, SYNC_ATTEMPT_CAP};
use crate::retry::RetryTimer;

/// Pushes pending decisions to the remote authority with bounded retry.
pub struct SyncEngine {
    queue: Arc<DecisionQueue>,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn DecisionSink>,
    bus: Arc<EventBus>,
    syncing: AtomicBool,
    attempt: AtomicU32,
    retry: RetryTimer,
}

impl SyncEngine {
    /// Create an engine over the given queue, credentials, and sink.
    pub fn new(
        queue: Arc<DecisionQueue>,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn DecisionSink>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            queue,
            credentials,
            sink,
            bus,
            syncing: AtomicBool::new(false),
            attempt: AtomicU32::new(0),
            retry: RetryTimer::new(),
        }
    }

    /// Push the pending queue to the remote authority.
    ///
    /// Returns immediately when a sync is already in flight. An empty queue
    /// counts as success. A missing credential and any transport or server
    /// failure all take the same backoff path: the queue is kept whole and
    /// one retry is scheduled (rescheduling cancels a previously pending
    /// one).
    pub async fn sync(self: Arc<Self>) {
        if self.syncing.swap(true, Ordering::SeqCst) {
            debug!("sync already in flight; collapsing into it");
            return;
        }
        self.bus.emit(Event::SyncStarted);

        match self.push_pending().await {
            Ok(synced) => {
                self.attempt.store(0, Ordering::SeqCst);
                if synced > 0 {
                    // A real acknowledgement supersedes any scheduled retry.
                    self.retry.cancel();
                    debug!(synced, "decision batch acknowledged");
                }
                self.bus.emit(Event::SyncSucceeded { synced });
            }
            Err(error) => {
                let attempt = (self.attempt.load(Ordering::SeqCst) + 1).min(SYNC_ATTEMPT_CAP);
                self.attempt.store(attempt, Ordering::SeqCst);
                let delay = backoff::sync_delay(attempt, backoff::jitter_ms());
                warn!(attempt, delay_ms = delay.as_millis() as u64, %error, "sync failed; retry scheduled");

                let engine = Arc::clone(&self);
                self.retry.schedule(delay, Self::sync_boxed(engine));
                self.bus.emit(Event::SyncFailed {
                    attempt,
                    delay,
                    error: error.to_string(),
                });
            }
        }

        self.syncing.store(false, Ordering::SeqCst);
    }

    /// The recursive scheduled retry, boxed to a concrete `Send` future so
    /// the `schedule` call inside `sync` does not force the compiler to infer
    /// `sync`'s own `Send`-ness through the recursion.
    fn sync_boxed(
        self: Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(self.sync())
    }

    async fn push_pending(&self) -> Result<usize> {
        let pending = self.queue.list().await;
        if pending.is_empty() {
            return Ok(0);
        }
        if self.credentials.access_token().await.is_none() {
            return Err(VigilError::AuthRequired);
        }

        self.sink.submit_decisions(&pending).await?;
        // Acknowledged: the batch leaves the device in one step.
        self.queue.remove_all().await?;
        Ok(pending.len())
    }

    /// Current failure count feeding the backoff curve.
    pub fn attempt_count(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    /// Whether a retry is scheduled and has not fired yet.
    pub fn is_retry_scheduled(&self) -> bool {
        self.retry.is_scheduled()
    }

    /// Cancel any pending retry and zero the failure count (logout path).
    pub fn reset(&self) {
        self.retry.cancel();
        self.attempt.store(0, Ordering::SeqCst);
    }
}
