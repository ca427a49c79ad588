//! Reconnecting realtime alert channel.
//!
//! One channel manager instance exists per authenticated session and owns
//! the single physical streaming connection, the subscriber registrations,
//! and the reconnect timer. Inbound alerts fan out to observers as typed
//! [`Event::AlertReceived`] bus events, then merge into the durable cache,
//! then opportunistically nudge the sync engine: inbound traffic proves the
//! network is up.
//!
//! Reconnection is bounded: the attempt counter caps at 6 (bounding delay
//! growth), the credential is re-resolved when the timer fires so a token
//! refreshed in the meantime is honored, and a missing credential skips the
//! reconnection outright rather than retrying further.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use vigil_core::effects::{AlertStreamConnector, CredentialProvider};
use vigil_core::{
    Alert, ConnectionState, Event, EventBus, EventKind, Result, Subscription, VigilError,
};
use vigil_store::AlertCache;

use crate::backoff::{self, RECONNECT_ATTEMPT_CAP};
use crate::engine::SyncEngine;
use crate::retry::RetryTimer;

/// Fixed stream path on the REST host.
const STREAM_PATH: &str = "/ws/alerts";

/// Alert type requested from the stream.
const STREAM_ALERT_TYPE: &str = "face-detection";

/// Inbound message bodies: a batch, a wrapped alert, or a bare alert.
#[derive(Deserialize)]
#[serde(untagged)]
enum InboundMessage {
    Batch(Vec<Alert>),
    Wrapped { alert: Alert },
    Single(Alert),
}

/// Derive the stream address from the REST base address.
///
/// The scheme is upgraded (`https` → `wss`, `http` → `ws`), the path is
/// fixed, and the session token and alert type travel in the query.
pub fn stream_url(base: &Url, token: &str) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(VigilError::internal(format!(
                "cannot derive stream address from scheme {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| VigilError::internal("could not upgrade scheme"))?;
    url.set_path(STREAM_PATH);
    url.query_pairs_mut()
        .clear()
        .append_pair("token", token)
        .append_pair("type", STREAM_ALERT_TYPE);
    Ok(url)
}

/// Manager of the one streaming connection per session.
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    base_url: Url,
    connector: Arc<dyn AlertStreamConnector>,
    credentials: Arc<dyn CredentialProvider>,
    cache: Arc<AlertCache>,
    engine: Arc<SyncEngine>,
    bus: Arc<EventBus>,
    state: Mutex<ConnectionState>,
    reconnect_attempt: AtomicU32,
    reconnect: RetryTimer,
    reader: Mutex<Option<JoinHandle<()>>>,
    observers: AtomicUsize,
}

impl RealtimeChannel {
    /// Create a channel manager. No connection is made until the first
    /// subscriber arrives.
    pub fn new(
        base_url: Url,
        connector: Arc<dyn AlertStreamConnector>,
        credentials: Arc<dyn CredentialProvider>,
        cache: Arc<AlertCache>,
        engine: Arc<SyncEngine>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                base_url,
                connector,
                credentials,
                cache,
                engine,
                bus,
                state: Mutex::new(ConnectionState::Disconnected),
                reconnect_attempt: AtomicU32::new(0),
                reconnect: RetryTimer::new(),
                reader: Mutex::new(None),
                observers: AtomicUsize::new(0),
            }),
        }
    }

    /// Register an observer pair.
    ///
    /// Requires a valid credential; its absence is a hard error to the
    /// caller, not retried. `on_status` immediately receives
    /// [`ConnectionState::Connecting`]. The first subscriber establishes the
    /// connection; later subscribers only register.
    pub async fn subscribe(
        &self,
        on_alert: impl Fn(&Alert) + Send + Sync + 'static,
        on_status: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Result<RealtimeSubscription> {
        let token = self
            .inner
            .credentials
            .access_token()
            .await
            .ok_or(VigilError::AuthRequired)?;

        let on_status = Arc::new(on_status);
        on_status(ConnectionState::Connecting);

        let alert_sub = self.inner.bus.on(EventKind::AlertReceived, move |event| {
            if let Event::AlertReceived(alert) = event {
                on_alert(alert);
            }
        });
        let status_cb = on_status.clone();
        let status_sub = self
            .inner
            .bus
            .on(EventKind::ConnectionStateChanged, move |event| {
                if let Event::ConnectionStateChanged(state) = event {
                    status_cb(*state);
                }
            });

        self.inner.observers.fetch_add(1, Ordering::SeqCst);
        ChannelInner::ensure_connected(&self.inner, token);

        Ok(RealtimeSubscription {
            inner: self.inner.clone(),
            alert_sub,
            status_sub,
        })
    }

    /// Current connection health.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Current reconnect failure count (capped at 6).
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.reconnect_attempt.load(Ordering::SeqCst)
    }

    /// Whether a reconnection is scheduled and has not fired yet.
    pub fn is_reconnect_scheduled(&self) -> bool {
        self.inner.reconnect.is_scheduled()
    }
}

impl ChannelInner {
    /// Spawn the reader task unless a live connection already exists.
    fn ensure_connected(inner: &Arc<Self>, token: String) {
        let mut reader = inner.reader.lock();
        if reader.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("stream already connected; observer registered only");
            return;
        }
        let task_inner = Arc::clone(inner);
        *reader = Some(tokio::spawn(Self::run_connection(task_inner, token)));
    }

    async fn run_connection(inner: Arc<Self>, token: String) {
        let url = match stream_url(&inner.base_url, &token) {
            Ok(url) => url,
            Err(error) => {
                warn!(%error, "could not derive stream address");
                Self::on_close(&inner);
                return;
            }
        };

        match inner.connector.connect(url.as_str()).await {
            Ok(mut stream) => {
                inner.reconnect_attempt.store(0, Ordering::SeqCst);
                inner.set_state(ConnectionState::Connected);
                info!("realtime stream connected");

                while let Some(message) = stream.next_message().await {
                    inner.handle_message(&message).await;
                }
                debug!("realtime stream closed");
            }
            Err(error) => {
                warn!(%error, "realtime connect failed");
            }
        }
        Self::on_close(&inner);
    }

    async fn handle_message(&self, raw: &str) {
        let alerts = match serde_json::from_str::<InboundMessage>(raw) {
            Ok(InboundMessage::Batch(alerts)) => alerts,
            Ok(InboundMessage::Wrapped { alert }) | Ok(InboundMessage::Single(alert)) => {
                vec![alert]
            }
            Err(error) => {
                warn!(%error, "unparseable stream message");
                return;
            }
        };

        for alert in alerts {
            self.bus.emit(Event::AlertReceived(alert.clone()));
            if let Err(error) = self.cache.merge(alert).await {
                warn!(%error, "could not merge streamed alert into cache");
            }
        }

        // Inbound traffic is itself a sync signal; failure here is the
        // engine's own retry problem.
        Arc::clone(&self.engine).sync().await;
    }

    /// Handle a closed (or never-established) connection: notify observers
    /// and schedule one reconnection, re-resolving the credential when the
    /// timer fires.
    fn on_close(inner: &Arc<Self>) {
        inner.set_state(ConnectionState::Disconnected);

        let attempt = (inner.reconnect_attempt.load(Ordering::SeqCst) + 1)
            .min(RECONNECT_ATTEMPT_CAP);
        inner.reconnect_attempt.store(attempt, Ordering::SeqCst);
        let delay = backoff::reconnect_delay(attempt, backoff::jitter_ms());
        debug!(attempt, delay_ms = delay.as_millis() as u64, "stream reconnect scheduled");

        let timer_inner = Arc::clone(inner);
        inner.reconnect.schedule(delay, async move {
            match timer_inner.credentials.access_token().await {
                Some(token) => Self::ensure_connected(&timer_inner, token),
                None => debug!("no credential at reconnect time; skipping"),
            }
        });
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(%state, "connection state changed");
        *self.state.lock() = state;
        self.bus.emit(Event::ConnectionStateChanged(state));
    }

    /// Tear the connection down and reset reconnect state.
    fn teardown(&self) {
        info!("last observer removed; tearing down realtime stream");
        self.reconnect.cancel();
        self.reconnect_attempt.store(0, Ordering::SeqCst);
        if let Some(task) = self.reader.lock().take() {
            task.abort();
        }
        *self.state.lock() = ConnectionState::Disconnected;
    }
}

/// Registered observer pair; unsubscribing the last one tears the
/// connection down.
pub struct RealtimeSubscription {
    inner: Arc<ChannelInner>,
    alert_sub: Subscription,
    status_sub: Subscription,
}

impl RealtimeSubscription {
    /// Remove this observer pair from the channel.
    pub fn unsubscribe(self) {
        self.alert_sub.unsubscribe();
        self.status_sub.unsubscribe();
        if self.inner.observers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_upgrades_scheme_and_sets_query() {
        let base = Url::parse("https://api.example.com").unwrap();
        let url = stream_url(&base, "tok-1").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.example.com/ws/alerts?token=tok-1&type=face-detection"
        );

        let plain = Url::parse("http://10.0.0.5:8080/v2").unwrap();
        let url = stream_url(&plain, "t").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://10.0.0.5:8080/ws/alerts?token=t&type=face-detection"
        );
    }

    #[test]
    fn test_stream_url_rejects_odd_schemes() {
        let base = Url::parse("file:///tmp/x").unwrap();
        assert!(stream_url(&base, "t").is_err());
    }

    #[test]
    fn test_inbound_message_shapes() {
        let batch: InboundMessage = serde_json::from_str(
            r#"[{"id": "A1", "timestamp": "2026-03-01T12:00:00Z"},
                {"id": "A2", "timestamp": "2026-03-01T12:01:00Z"}]"#,
        )
        .unwrap();
        assert!(matches!(batch, InboundMessage::Batch(ref alerts) if alerts.len() == 2));

        let wrapped: InboundMessage = serde_json::from_str(
            r#"{"alert": {"id": "A1", "timestamp": "2026-03-01T12:00:00Z"}}"#,
        )
        .unwrap();
        assert!(matches!(wrapped, InboundMessage::Wrapped { ref alert } if alert.id == "A1"));

        let bare: InboundMessage =
            serde_json::from_str(r#"{"id": "A1", "timestamp": "2026-03-01T12:00:00Z"}"#).unwrap();
        assert!(matches!(bare, InboundMessage::Single(ref alert) if alert.id == "A1"));
    }
}
