//! Deterministic offline placeholder alerts.
//!
//! Shown only when there is no session and nothing cached. Purely
//! illustrative; never treated as authoritative and never written to the
//! cache.

use chrono::{DateTime, Duration, Utc};

use vigil_core::types::{AlertDetail, CameraId, CameraInfo, Individual, StoreInfo};
use vigil_core::{Alert, AlertStatus};

/// Number of placeholder alerts generated.
pub const PLACEHOLDER_COUNT: usize = 100;

const PORTRAITS: [&str; 6] = [
    "https://randomuser.me/api/portraits/men/32.jpg",
    "https://randomuser.me/api/portraits/women/44.jpg",
    "https://randomuser.me/api/portraits/men/65.jpg",
    "https://randomuser.me/api/portraits/women/12.jpg",
    "https://randomuser.me/api/portraits/men/5.jpg",
    "https://randomuser.me/api/portraits/women/68.jpg",
];

const DETECTIONS: [&str; 6] = [
    "https://randomuser.me/api/portraits/men/33.jpg",
    "https://randomuser.me/api/portraits/women/45.jpg",
    "https://randomuser.me/api/portraits/men/66.jpg",
    "https://randomuser.me/api/portraits/women/13.jpg",
    "https://randomuser.me/api/portraits/men/6.jpg",
    "https://randomuser.me/api/portraits/women/69.jpg",
];

/// Placeholder set anchored at `now`, newest first, one per minute.
pub fn placeholder_alerts(now: DateTime<Utc>) -> Vec<Alert> {
    (0..PLACEHOLDER_COUNT)
        .map(|i| placeholder_alert(i, now))
        .collect()
}

fn placeholder_alert(i: usize, now: DateTime<Utc>) -> Alert {
    Alert {
        id: format!("QE{}", 100 + i),
        timestamp: now - Duration::minutes(i as i64),
        status: AlertStatus::Unreviewed,
        store: Some(StoreInfo {
            id: Some("store-1".into()),
            name: Some("Camden Shop - Hove".into()),
            location: Some("Camden Shop - Hove".into()),
        }),
        camera: Some(CameraInfo {
            id: Some(CameraId::Number(i as i64)),
            location: Some("Entrance 4".into()),
        }),
        detail: AlertDetail::Face {
            individual: Some(Individual {
                id: format!("person-{i}"),
                image_url: Some(PORTRAITS[i % PORTRAITS.len()].into()),
            }),
            detection_image: Some(DETECTIONS[i % DETECTIONS.len()].into()),
            prediction: Some((60 + (i * 7) % 36) as f64),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_deterministic() {
        let now = Utc::now();
        assert_eq!(placeholder_alerts(now), placeholder_alerts(now));
    }

    #[test]
    fn test_placeholders_have_unique_ids_newest_first() {
        let alerts = placeholder_alerts(Utc::now());
        assert_eq!(alerts.len(), PLACEHOLDER_COUNT);

        let mut ids: Vec<_> = alerts.iter().map(|a| a.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), PLACEHOLDER_COUNT);

        assert!(alerts.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_placeholders_are_unreviewed() {
        assert!(placeholder_alerts(Utc::now())
            .iter()
            .all(|a| a.status == AlertStatus::Unreviewed));
    }
}
