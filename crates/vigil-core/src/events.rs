//! In-process typed event bus.
//!
//! Synchronous publish/subscribe keyed by event kind, used to decouple the
//! sync engine, realtime channel, and reconciler from each other and from
//! presentation. No persistence, no replay, no backpressure.
//!
//! Delivery contract: `emit` invokes a snapshot of the subscribers registered
//! at emit time. Subscribers added during an emission are not invoked for
//! that emission; subscribers removed during an emission are still invoked
//! if captured in the snapshot. Each invocation is isolated: a panicking
//! subscriber is caught and logged, and delivery to the rest continues.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use crate::types::{Alert, AlertStatus, ConnectionState};

/// Lifecycle and data events published on the [`EventBus`].
#[derive(Debug, Clone)]
pub enum Event {
    /// A sync attempt entered the `Syncing` state.
    SyncStarted,
    /// A sync attempt completed; `synced` decisions were acknowledged.
    SyncSucceeded {
        /// Number of decisions the server accepted (0 for an empty queue).
        synced: usize,
    },
    /// A sync attempt failed and a retry was scheduled.
    SyncFailed {
        /// Failure count driving the backoff curve, capped at the curve limit.
        attempt: u32,
        /// Delay until the scheduled retry fires.
        delay: Duration,
        /// Description of the failure.
        error: String,
    },
    /// The realtime stream delivered an alert.
    AlertReceived(Alert),
    /// The realtime connection changed state.
    ConnectionStateChanged(ConnectionState),
    /// A cached alert's review status was updated locally.
    AlertStatusChanged {
        /// Alert whose status changed.
        alert_id: String,
        /// New status.
        status: AlertStatus,
    },
}

impl Event {
    /// The subscription key this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SyncStarted => EventKind::SyncStarted,
            Self::SyncSucceeded { .. } => EventKind::SyncSucceeded,
            Self::SyncFailed { .. } => EventKind::SyncFailed,
            Self::AlertReceived(_) => EventKind::AlertReceived,
            Self::ConnectionStateChanged(_) => EventKind::ConnectionStateChanged,
            Self::AlertStatusChanged { .. } => EventKind::AlertStatusChanged,
        }
    }
}

/// Subscription key, one per [`Event`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventKind {
    SyncStarted,
    SyncSucceeded,
    SyncFailed,
    AlertReceived,
    ConnectionStateChanged,
    AlertStatusChanged,
}

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
}

type ListenerMap = Mutex<HashMap<EventKind, Vec<Listener>>>;

/// Synchronous in-process publish/subscribe bus.
#[derive(Default)]
pub struct EventBus {
    listeners: Arc<ListenerMap>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `kind`.
    ///
    /// The returned [`Subscription`] removes the callback when consumed;
    /// dropping it without calling [`Subscription::unsubscribe`] leaves the
    /// callback registered for the life of the bus.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().entry(kind).or_default().push(Listener {
            id,
            callback: Arc::new(callback),
        });
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            kind,
            id,
        }
    }

    /// Deliver `event` to a snapshot of the current subscribers for its kind.
    pub fn emit(&self, event: Event) {
        let snapshot: Vec<Callback> = {
            let listeners = self.listeners.lock();
            listeners
                .get(&event.kind())
                .map(|list| list.iter().map(|l| l.callback.clone()).collect())
                .unwrap_or_default()
        };
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                warn!(kind = ?event.kind(), "event subscriber panicked; continuing delivery");
            }
        }
    }

    /// Number of subscribers currently registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }
}

/// Handle to a registered callback.
pub struct Subscription {
    listeners: Weak<ListenerMap>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Remove the callback from the bus.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if let Some(list) = listeners.lock().get_mut(&self.kind) {
                list.retain(|l| l.id != self.id);
            }
        }
    }
}
