//! Encrypted queue of pending review decisions.
//!
//! The queue is the single source of truth for decisions the remote
//! authority has not yet acknowledged. It is a whole-document record: every
//! mutation decrypts the full queue, rewrites it, and re-seals it with a
//! fresh IV. Mutation is assumed to be serialized by the caller (one
//! reviewing actor per device); this is an assumption, not a guarantee.

use std::sync::Arc;

use tracing::warn;

use vigil_core::{Decision, Result};

use crate::crypto::CryptoStore;

/// Blob-store record holding the sealed queue.
const QUEUE_RECORD: &str = "vigil.decision-queue";

/// Append-only local queue of not-yet-acknowledged decisions.
pub struct DecisionQueue {
    crypto: Arc<CryptoStore>,
}

impl DecisionQueue {
    /// Create a queue over the given crypto store.
    pub fn new(crypto: Arc<CryptoStore>) -> Self {
        Self { crypto }
    }

    /// Append a decision and re-seal the queue.
    ///
    /// A corrupt or absent stored queue starts from empty. The write itself
    /// propagates errors: failing to persist a fresh decision is the one
    /// user-visible failure surface of the sync core.
    pub async fn enqueue(&self, decision: Decision) -> Result<()> {
        let mut pending = self.load_or_empty().await;
        pending.push(decision);
        let payload = serde_json::to_vec(&pending)
            .map_err(|e| vigil_core::VigilError::serialization(e.to_string()))?;
        self.crypto.seal(QUEUE_RECORD, &payload).await
    }

    /// All pending decisions in insertion order.
    ///
    /// Fails open: any decode failure is logged and yields an empty list.
    pub async fn list(&self) -> Vec<Decision> {
        self.load_or_empty().await
    }

    /// Whether a pending decision exists for `alert_id`.
    pub async fn has_pending_for(&self, alert_id: &str) -> bool {
        self.list().await.iter().any(|d| d.alert_id == alert_id)
    }

    /// Delete the queue record after the server acknowledged the batch.
    pub async fn remove_all(&self) -> Result<()> {
        self.crypto.remove(QUEUE_RECORD).await
    }

    /// Explicit wipe for logout: deletes the queue record and resets the
    /// salt, permanently invalidating any not-yet-migrated legacy blob.
    pub async fn clear(&self) -> Result<()> {
        self.crypto.remove(QUEUE_RECORD).await?;
        self.crypto.reset().await
    }

    async fn load_or_empty(&self) -> Vec<Decision> {
        match self.crypto.open(QUEUE_RECORD).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(pending) => pending,
                Err(error) => {
                    warn!(%error, "decision queue payload is corrupt; reading as empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(error) => {
                warn!(%error, "could not open decision queue; reading as empty");
                Vec::new()
            }
        }
    }
}
