//! Shared fixtures for Vigil tests.

use chrono::{DateTime, Utc};

use vigil_core::types::{AlertDetail, Individual};
use vigil_core::{Alert, AlertStatus, Decision};

/// Face-detection alert with the given id, timestamped now.
pub fn sample_alert(id: &str) -> Alert {
    sample_alert_at(id, Utc::now())
}

/// Face-detection alert with the given id and timestamp.
pub fn sample_alert_at(id: &str, timestamp: DateTime<Utc>) -> Alert {
    Alert {
        id: id.to_string(),
        timestamp,
        status: AlertStatus::Unreviewed,
        store: None,
        camera: None,
        detail: AlertDetail::Face {
            individual: Some(Individual {
                id: format!("person-{id}"),
                image_url: None,
            }),
            detection_image: None,
            prediction: Some(80.0),
        },
    }
}

/// Confirm decision for the given alert id, enqueued now.
pub fn sample_decision(alert_id: &str) -> Decision {
    Decision {
        alert_id: alert_id.to_string(),
        decision: AlertStatus::Confirmed,
        action: "confirm_theft".into(),
        enqueued_at: Utc::now(),
    }
}

/// Install a compact tracing subscriber honoring `RUST_LOG`, once.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .compact()
        .try_init();
}
