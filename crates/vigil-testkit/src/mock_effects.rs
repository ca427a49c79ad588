//! In-memory implementations of the `vigil-core` effect traits.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use vigil_core::effects::{
    AlertStream, AlertStreamConnector, AlertsGateway, CredentialProvider, DecisionSink,
    SecureBlobStore,
};
use vigil_core::{Alert, Decision, Result, VigilError};

/// In-memory [`SecureBlobStore`].
#[derive(Default)]
pub struct MemoryBlobStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SecureBlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.records.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.lock().remove(key);
        Ok(())
    }
}

/// [`CredentialProvider`] with directly settable tokens.
#[derive(Default)]
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
    refresh_result: Mutex<Option<String>>,
}

impl StaticCredentials {
    /// Provider holding the given access token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
            refresh_result: Mutex::new(None),
        }
    }

    /// Provider with no session.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Replace the current access token.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }

    /// Set what the next `refresh()` calls will return.
    pub fn set_refresh_result(&self, token: Option<String>) {
        *self.refresh_result.lock() = token;
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    async fn refresh(&self) -> Option<String> {
        let refreshed = self.refresh_result.lock().clone();
        if let Some(token) = &refreshed {
            *self.token.lock() = Some(token.clone());
        }
        refreshed
    }
}

/// [`DecisionSink`] that records every submission.
///
/// Outcomes are served from a queue (default `Ok`); an optional artificial
/// delay keeps a submission in flight so overlap can be observed.
#[derive(Default)]
pub struct RecordingSink {
    submissions: Mutex<Vec<Vec<Decision>>>,
    outcomes: Mutex<VecDeque<Result<()>>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSink {
    /// Sink that accepts every batch.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Queue an outcome for an upcoming submission.
    pub fn push_outcome(&self, outcome: Result<()>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Fail the next submission with `error`.
    pub fn fail_next(&self, error: VigilError) {
        self.push_outcome(Err(error));
    }

    /// Hold each submission in flight for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Every batch submitted so far, including failed attempts.
    pub fn submissions(&self) -> Vec<Vec<Decision>> {
        self.submissions.lock().clone()
    }

    /// Number of submissions attempted.
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Peak number of overlapping in-flight submissions observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionSink for RecordingSink {
    async fn submit_decisions(&self, decisions: &[Decision]) -> Result<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.submissions.lock().push(decisions.to_vec());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// [`AlertsGateway`] serving a settable snapshot.
#[derive(Default)]
pub struct StaticGateway {
    alerts: Mutex<Option<Vec<Alert>>>,
    fetch_calls: AtomicUsize,
}

impl StaticGateway {
    /// Gateway returning the given snapshot.
    pub fn returning(alerts: Vec<Alert>) -> Self {
        Self {
            alerts: Mutex::new(Some(alerts)),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Gateway whose fetches fail with a network error.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Replace the served snapshot (`None` makes fetches fail).
    pub fn set_alerts(&self, alerts: Option<Vec<Alert>>) {
        *self.alerts.lock() = alerts;
    }

    /// Number of fetches attempted.
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertsGateway for StaticGateway {
    async fn fetch_face_alerts(&self) -> Result<Vec<Alert>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.alerts
            .lock()
            .clone()
            .ok_or_else(|| VigilError::network("scripted fetch failure"))
    }
}

/// One scripted lifetime of a streaming connection.
pub enum ScriptedSession {
    /// Deliver the frames in order, then close.
    DeliverThenClose(Vec<String>),
    /// Deliver the frames in order, then stay open until dropped.
    DeliverThenHold(Vec<String>),
}

/// [`AlertStreamConnector`] serving pre-scripted sessions in order.
///
/// A connect with no session left fails, which the channel treats like an
/// immediately closed connection.
#[derive(Default)]
pub struct ScriptedConnector {
    sessions: Mutex<VecDeque<ScriptedSession>>,
    connect_calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    /// Connector with no sessions scripted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session to the script.
    pub fn push_session(&self, session: ScriptedSession) {
        self.sessions.lock().push_back(session);
    }

    /// Number of connection attempts made.
    pub fn connect_count(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// URLs passed to each connection attempt.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl AlertStreamConnector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn AlertStream>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        match self.sessions.lock().pop_front() {
            Some(session) => Ok(Box::new(ScriptedStream::new(session))),
            None => Err(VigilError::connection_closed("no scripted session left")),
        }
    }
}

struct ScriptedStream {
    frames: VecDeque<String>,
    hold_open: bool,
}

impl ScriptedStream {
    fn new(session: ScriptedSession) -> Self {
        match session {
            ScriptedSession::DeliverThenClose(frames) => Self {
                frames: frames.into(),
                hold_open: false,
            },
            ScriptedSession::DeliverThenHold(frames) => Self {
                frames: frames.into(),
                hold_open: true,
            },
        }
    }
}

#[async_trait]
impl AlertStream for ScriptedStream {
    async fn next_message(&mut self) -> Option<String> {
        if let Some(frame) = self.frames.pop_front() {
            // Yield so connection-open bookkeeping settles before delivery.
            tokio::task::yield_now().await;
            return Some(frame);
        }
        if self.hold_open {
            std::future::pending::<()>().await;
        }
        None
    }
}
