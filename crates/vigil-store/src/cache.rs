//! Encrypted snapshot of the most recent alert list.
//!
//! The cache holds whatever the client last knew about the remote alert set:
//! the realtime channel merges inbound alerts into it, the reconciler reads
//! it as the offline base view, and review actions update statuses in place.
//! Like the decision queue it is a whole-document record.

use std::sync::Arc;

use tracing::warn;

use vigil_core::{Alert, AlertStatus, Result};

use crate::crypto::CryptoStore;

/// Blob-store record holding the sealed snapshot.
const CACHE_RECORD: &str = "vigil.alerts-cache";

/// Replace-by-id merge, newest first.
///
/// If `incoming.id` is already present its entry is replaced wholesale
/// (newest write wins for the payload); otherwise the alert is inserted. The
/// result is resorted by timestamp descending. Applying the same alert twice
/// yields the same list.
pub fn merge_by_id(alerts: &mut Vec<Alert>, incoming: Alert) {
    match alerts.iter_mut().find(|a| a.id == incoming.id) {
        Some(existing) => *existing = incoming,
        None => alerts.push(incoming),
    }
    sort_newest_first(alerts);
}

/// Sort alerts by timestamp descending (stable).
pub fn sort_newest_first(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Durable encrypted alert snapshot.
pub struct AlertCache {
    crypto: Arc<CryptoStore>,
}

impl AlertCache {
    /// Create a cache over the given crypto store.
    pub fn new(crypto: Arc<CryptoStore>) -> Self {
        Self { crypto }
    }

    /// The cached snapshot, or `None` when absent or unreadable.
    ///
    /// Fails open: decode failures are logged and read as a miss.
    pub async fn load(&self) -> Option<Vec<Alert>> {
        match self.crypto.open(CACHE_RECORD).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(alerts) => Some(alerts),
                Err(error) => {
                    warn!(%error, "alert cache payload is corrupt; reading as a miss");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "could not open alert cache; reading as a miss");
                None
            }
        }
    }

    /// Replace the snapshot.
    pub async fn save(&self, alerts: &[Alert]) -> Result<()> {
        let payload = serde_json::to_vec(alerts)
            .map_err(|e| vigil_core::VigilError::serialization(e.to_string()))?;
        self.crypto.seal(CACHE_RECORD, &payload).await
    }

    /// Merge one inbound alert into the snapshot and persist the result.
    ///
    /// Returns the merged list. Idempotent per the replace-by-id rule.
    pub async fn merge(&self, alert: Alert) -> Result<Vec<Alert>> {
        let mut alerts = self.load().await.unwrap_or_default();
        merge_by_id(&mut alerts, alert);
        self.save(&alerts).await?;
        Ok(alerts)
    }

    /// Update the status of a cached alert in place.
    ///
    /// Returns the updated alert, or `None` when the id is not cached.
    pub async fn set_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<Option<Alert>> {
        let mut alerts = self.load().await.unwrap_or_default();
        let Some(entry) = alerts.iter_mut().find(|a| a.id == alert_id) else {
            return Ok(None);
        };
        entry.status = status;
        let updated = entry.clone();
        sort_newest_first(&mut alerts);
        self.save(&alerts).await?;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use vigil_testkit::{sample_alert, sample_alert_at, MemoryBlobStore};

    fn cache() -> AlertCache {
        AlertCache::new(Arc::new(CryptoStore::new(Arc::new(
            MemoryBlobStore::new(),
        ))))
    }

    #[tokio::test]
    async fn test_merge_inserts_and_sorts_newest_first() {
        let cache = cache();
        let now = Utc::now();

        cache
            .merge(sample_alert_at("OLD", now - Duration::minutes(10)))
            .await
            .unwrap();
        let merged = cache.merge(sample_alert_at("NEW", now)).await.unwrap();

        let ids: Vec<_> = merged.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["NEW", "OLD"]);
    }

    #[tokio::test]
    async fn test_merge_replaces_by_id() {
        let cache = cache();
        cache.merge(sample_alert("A1")).await.unwrap();

        let mut updated = sample_alert("A1");
        updated.status = AlertStatus::Dismissed;
        let merged = cache.merge(updated).await.unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, AlertStatus::Dismissed);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let cache = cache();
        let alert = sample_alert("A1");

        let once = cache.merge(alert.clone()).await.unwrap();
        let twice = cache.merge(alert).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_set_status_persists() {
        let cache = cache();
        cache.merge(sample_alert("A1")).await.unwrap();

        let updated = cache
            .set_status("A1", AlertStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, AlertStatus::Confirmed);

        let reloaded = cache.load().await.unwrap();
        assert_eq!(reloaded[0].status, AlertStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_set_status_unknown_id_is_none() {
        let cache = cache();
        cache.merge(sample_alert("A1")).await.unwrap();
        let missing = cache
            .set_status("A2", AlertStatus::Confirmed)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_load_miss_when_nothing_stored() {
        assert!(cache().load().await.is_none());
    }
}
