//! Alert reconciliation.
//!
//! Produces the one alert view the rest of the app observes: the freshest
//! available base snapshot with the reviewer's pending decisions overlaid
//! optimistically. The raw remote snapshot is never exposed on its own.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use vigil_core::effects::{AlertsGateway, CredentialProvider};
use vigil_core::{Alert, AlertStatus, Decision, Event, EventBus, Result};
use vigil_store::{sort_newest_first, AlertCache, DecisionQueue};

use crate::sample;

/// Optimistic overlay of pending decisions onto a snapshot.
///
/// An alert still `unreviewed` displays the target status of its pending
/// decision (the most recently enqueued one, if several). An alert already
/// carrying a server-confirmed non-`unreviewed` status is never overwritten:
/// server authority wins once it has spoken.
pub fn overlay_pending(mut alerts: Vec<Alert>, pending: &[Decision]) -> Vec<Alert> {
    for alert in &mut alerts {
        if alert.status != AlertStatus::Unreviewed {
            continue;
        }
        if let Some(decision) = pending.iter().rev().find(|d| d.alert_id == alert.id) {
            alert.status = decision.decision;
        }
    }
    alerts
}

/// The read path: merges remote, cached, and pending local data.
pub struct AlertReconciler {
    gateway: Arc<dyn AlertsGateway>,
    credentials: Arc<dyn CredentialProvider>,
    cache: Arc<AlertCache>,
    queue: Arc<DecisionQueue>,
    bus: Arc<EventBus>,
}

impl AlertReconciler {
    /// Create a reconciler over the given collaborators.
    pub fn new(
        gateway: Arc<dyn AlertsGateway>,
        credentials: Arc<dyn CredentialProvider>,
        cache: Arc<AlertCache>,
        queue: Arc<DecisionQueue>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            cache,
            queue,
            bus,
        }
    }

    /// The reconciled view, newest first.
    ///
    /// Base snapshot: a fresh remote fetch when authenticated (cached on
    /// success; cache fallback on failure), the cache when signed out, and
    /// the deterministic placeholder set when there is nothing at all.
    pub async fn current_view(&self) -> Vec<Alert> {
        let mut base = self.base_snapshot().await;
        sort_newest_first(&mut base);
        let pending = self.queue.list().await;
        overlay_pending(base, &pending)
    }

    async fn base_snapshot(&self) -> Vec<Alert> {
        if self.credentials.access_token().await.is_none() {
            if let Some(cached) = self.cache.load().await {
                if !cached.is_empty() {
                    return cached;
                }
            }
            return sample::placeholder_alerts(Utc::now());
        }

        match self.gateway.fetch_face_alerts().await {
            Ok(alerts) => {
                if let Err(error) = self.cache.save(&alerts).await {
                    warn!(%error, "could not cache fetched alerts");
                }
                alerts
            }
            Err(error) => {
                debug!(%error, "alert fetch failed; serving cached snapshot");
                match self.cache.load().await {
                    Some(cached) => cached,
                    None => sample::placeholder_alerts(Utc::now()),
                }
            }
        }
    }

    /// Apply a review outcome to the cached snapshot and announce it.
    ///
    /// Returns the updated alert, or `None` when the id is not cached.
    pub async fn mark_reviewed(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<Option<Alert>> {
        let updated = self.cache.set_status(alert_id, status).await?;
        if let Some(alert) = &updated {
            self.bus.emit(Event::AlertStatusChanged {
                alert_id: alert.id.clone(),
                status,
            });
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vigil_store::{merge_by_id, CryptoStore};
    use vigil_testkit::{
        sample_alert, sample_alert_at, sample_decision, MemoryBlobStore, StaticCredentials,
        StaticGateway,
    };

    struct Harness {
        gateway: Arc<StaticGateway>,
        credentials: Arc<StaticCredentials>,
        cache: Arc<AlertCache>,
        queue: Arc<DecisionQueue>,
        reconciler: AlertReconciler,
    }

    fn harness(gateway: StaticGateway, credentials: StaticCredentials) -> Harness {
        let crypto = Arc::new(CryptoStore::new(Arc::new(MemoryBlobStore::new())));
        let gateway = Arc::new(gateway);
        let credentials = Arc::new(credentials);
        let cache = Arc::new(AlertCache::new(crypto.clone()));
        let queue = Arc::new(DecisionQueue::new(crypto));
        let reconciler = AlertReconciler::new(
            gateway.clone(),
            credentials.clone(),
            cache.clone(),
            queue.clone(),
            Arc::new(EventBus::new()),
        );
        Harness {
            gateway,
            credentials,
            cache,
            queue,
            reconciler,
        }
    }

    #[test]
    fn test_overlay_dresses_unreviewed_alerts() {
        let alerts = vec![sample_alert("A1"), sample_alert("A2")];
        let pending = vec![sample_decision("A1")];

        let view = overlay_pending(alerts, &pending);
        assert_eq!(view[0].status, AlertStatus::Confirmed);
        assert_eq!(view[1].status, AlertStatus::Unreviewed);
    }

    #[test]
    fn test_overlay_never_overrides_server_status() {
        let mut alert = sample_alert("A1");
        alert.status = AlertStatus::Confirmed;
        let mut pending = sample_decision("A1");
        pending.decision = AlertStatus::Dismissed;

        let view = overlay_pending(vec![alert], &[pending]);
        assert_eq!(view[0].status, AlertStatus::Confirmed);
    }

    #[test]
    fn test_overlay_latest_pending_decision_wins() {
        let alerts = vec![sample_alert("A1")];
        let mut older = sample_decision("A1");
        older.decision = AlertStatus::Confirmed;
        let mut newer = sample_decision("A1");
        newer.decision = AlertStatus::Dismissed;

        let view = overlay_pending(alerts, &[older, newer]);
        assert_eq!(view[0].status, AlertStatus::Dismissed);
    }

    #[tokio::test]
    async fn test_authenticated_fetch_feeds_cache() {
        let h = harness(
            StaticGateway::returning(vec![sample_alert("R1")]),
            StaticCredentials::with_token("tok"),
        );

        let view = h.reconciler.current_view().await;
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "R1");
        assert_eq!(h.gateway.fetch_count(), 1);

        let cached = h.cache.load().await.unwrap();
        assert_eq!(cached[0].id, "R1");
    }

    #[tokio::test]
    async fn test_fetch_failure_serves_cached_snapshot() {
        let h = harness(StaticGateway::failing(), StaticCredentials::with_token("tok"));
        h.cache.save(&[sample_alert("C1")]).await.unwrap();

        let view = h.reconciler.current_view().await;
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "C1");
    }

    #[tokio::test]
    async fn test_signed_out_with_empty_cache_serves_placeholders() {
        let h = harness(StaticGateway::failing(), StaticCredentials::absent());

        let view = h.reconciler.current_view().await;
        assert_eq!(view.len(), sample::PLACEHOLDER_COUNT);
        // Never a remote call without a session.
        assert_eq!(h.gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_view_is_sorted_newest_first() {
        let now = Utc::now();
        let h = harness(
            StaticGateway::returning(vec![
                sample_alert_at("OLD", now - Duration::minutes(30)),
                sample_alert_at("NEW", now),
                sample_alert_at("MID", now - Duration::minutes(10)),
            ]),
            StaticCredentials::with_token("tok"),
        );

        let ids: Vec<_> = h
            .reconciler
            .current_view()
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, ["NEW", "MID", "OLD"]);
    }

    #[tokio::test]
    async fn test_scenario_pending_overlay_then_server_override() {
        // Signed out so the cache is the base view.
        let h = harness(StaticGateway::failing(), StaticCredentials::absent());

        // Realtime delivered A1 unreviewed; the reviewer confirmed it
        // locally while offline.
        h.cache.merge(sample_alert("A1")).await.unwrap();
        h.queue.enqueue(sample_decision("A1")).await.unwrap();

        let view = h.reconciler.current_view().await;
        assert_eq!(view[0].status, AlertStatus::Confirmed);

        // The server later speaks authoritatively: dismissed wins over the
        // local overlay.
        let mut authoritative = sample_alert("A1");
        authoritative.status = AlertStatus::Dismissed;
        h.cache.merge(authoritative).await.unwrap();

        let view = h.reconciler.current_view().await;
        assert_eq!(view[0].status, AlertStatus::Dismissed);
    }

    #[tokio::test]
    async fn test_mark_reviewed_updates_cache_and_announces() {
        let h = harness(StaticGateway::failing(), StaticCredentials::absent());
        h.cache.merge(sample_alert("A1")).await.unwrap();

        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = bus.on(vigil_core::EventKind::AlertStatusChanged, move |event| {
            if let Event::AlertStatusChanged { alert_id, status } = event {
                sink.lock().push((alert_id.clone(), *status));
            }
        });
        let reconciler = AlertReconciler::new(
            h.gateway.clone(),
            h.credentials.clone(),
            h.cache.clone(),
            h.queue.clone(),
            bus,
        );

        let updated = reconciler
            .mark_reviewed("A1", AlertStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, AlertStatus::Confirmed);
        assert_eq!(
            seen.lock().as_slice(),
            &[("A1".to_string(), AlertStatus::Confirmed)]
        );

        assert_eq!(
            h.cache.load().await.unwrap()[0].status,
            AlertStatus::Confirmed
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Replace-by-id merge is idempotent regardless of where the
            // incoming alert lands.
            #[test]
            fn prop_merge_is_idempotent(extra in 0usize..8, minutes in 0i64..240) {
                let now = Utc::now();
                let mut alerts: Vec<Alert> = (0..extra)
                    .map(|i| sample_alert_at(&format!("X{i}"), now - Duration::minutes(i as i64)))
                    .collect();
                let incoming = sample_alert_at("A1", now - Duration::minutes(minutes));

                merge_by_id(&mut alerts, incoming.clone());
                let once = alerts.clone();
                merge_by_id(&mut alerts, incoming);
                prop_assert_eq!(once, alerts);
            }
        }
    }
}
