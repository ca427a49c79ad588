//! Effect seams to external collaborators.
//!
//! The sync core never talks to a keychain, an HTTP client, or a WebSocket
//! directly; it is parameterized by these traits. Production implementations
//! live in `vigil-session` and `vigil-sync`; deterministic test doubles live
//! in `vigil-testkit`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Alert, Decision};

/// Platform secure key-value store for opaque byte payloads.
///
/// Backed by the device keychain/keystore in production. All Vigil
/// persistence (salt, encrypted queue/cache records, session tokens) goes
/// through this seam.
#[async_trait]
pub trait SecureBlobStore: Send + Sync {
    /// Fetch the record stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any existing record.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove the record stored under `key`. Removing an absent record is
    /// not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Session credential source.
///
/// Token refresh and storage are owned by the session layer; the sync core
/// only ever asks for the current token or for a refresh.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The current access token, if a session is active.
    async fn access_token(&self) -> Option<String>;

    /// Attempt to refresh the session, returning the new access token.
    async fn refresh(&self) -> Option<String>;
}

/// Remote authority accepting review decisions.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    /// Submit `decisions` as one batch. `Ok` means the server acknowledged
    /// the whole batch (2xx); any other outcome is an error.
    async fn submit_decisions(&self, decisions: &[Decision]) -> Result<()>;
}

/// Remote authority serving the alert snapshot.
#[async_trait]
pub trait AlertsGateway: Send + Sync {
    /// Fetch the current face-detection alert list.
    async fn fetch_face_alerts(&self) -> Result<Vec<Alert>>;
}

/// One established streaming connection.
///
/// Yields raw text frames until the connection closes.
#[async_trait]
pub trait AlertStream: Send {
    /// Next inbound message, or `None` once the connection has closed.
    async fn next_message(&mut self) -> Option<String>;
}

/// Factory for streaming connections to the alert service.
#[async_trait]
pub trait AlertStreamConnector: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn AlertStream>>;
}
