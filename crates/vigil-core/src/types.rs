//! Alert and decision wire types.
//!
//! Field names follow the remote authority's JSON: alert payload fields are
//! snake_case, decision fields are camelCase. `Alert.id` is the merge key
//! everywhere; the newest write for a given id determines its payload, while
//! `status` follows the reconciler's overlay rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review status of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// No reviewer has acted on the alert yet.
    #[default]
    Unreviewed,
    /// A reviewer confirmed the detection.
    Confirmed,
    /// A reviewer dismissed the detection.
    Dismissed,
}

/// Site the detection originated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Stable store identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Camera identifier; the server sends either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraId {
    /// Numeric camera id.
    Number(i64),
    /// String camera id.
    Text(String),
}

/// Camera the detection originated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Camera identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CameraId>,
    /// Mount location within the site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Matched individual in a face-detection alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    /// Stable person identifier.
    pub id: String,
    /// Reference portrait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Concealment-event media and origin references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcealmentPayload {
    /// Still frame of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Recorded clip of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Originating store, as a label or a full record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreRef>,
    /// Originating camera, as a label or a full record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraRef>,
}

/// Store reference inside a concealment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreRef {
    /// Bare display label.
    Label(String),
    /// Full store record.
    Info(StoreInfo),
}

/// Camera reference inside a concealment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraRef {
    /// Bare display label.
    Label(String),
    /// Full camera record.
    Info(CameraInfo),
}

/// Kind-specific alert payload.
///
/// Untagged: a concealment alert is recognized by its `concealment` object,
/// anything else decodes as a face detection (every face field is optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertDetail {
    /// Concealment event with recorded media.
    Concealment {
        /// Event media and origin references.
        concealment: ConcealmentPayload,
    },
    /// Face-detection match.
    Face {
        /// Matched individual.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        individual: Option<Individual>,
        /// Frame the match was made on.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detection_image: Option<String>,
        /// Match confidence, 0-100.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prediction: Option<f64>,
    },
}

impl Default for AlertDetail {
    fn default() -> Self {
        Self::Face {
            individual: None,
            detection_image: None,
            prediction: None,
        }
    }
}

/// A detection alert as fetched, streamed, and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier, stable across fetch and stream.
    pub id: String,
    /// When the detection occurred.
    pub timestamp: DateTime<Utc>,
    /// Current review status; absent on the wire means unreviewed.
    #[serde(default)]
    pub status: AlertStatus,
    /// Originating store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreInfo>,
    /// Originating camera.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraInfo>,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub detail: AlertDetail,
}

/// A reviewer's verdict on a single alert, queued until the remote authority
/// acknowledges the batch it is submitted in.
///
/// Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Alert the decision applies to.
    pub alert_id: String,
    /// Target status chosen by the reviewer.
    pub decision: AlertStatus,
    /// UI action that produced the decision (e.g. `confirm_theft`).
    pub action: String,
    /// When the decision was recorded locally.
    pub enqueued_at: DateTime<Utc>,
}

/// Health of the realtime stream connection, owned by the channel manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Connection attempt in progress.
    Connecting,
    /// Stream established.
    Connected,
    /// No live connection.
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn face_alert_json() -> &'static str {
        r#"{
            "id": "QE101",
            "timestamp": "2026-03-01T12:00:00Z",
            "status": "unreviewed",
            "individual": {"id": "person-1", "image_url": "https://img/1.jpg"},
            "detection_image": "https://img/d1.jpg",
            "prediction": 82.0,
            "store": {"id": "store-1", "name": "Camden Shop", "location": "Hove"},
            "camera": {"id": 4, "location": "Entrance 4"}
        }"#
    }

    #[test]
    fn test_face_alert_round_trip() {
        let alert: Alert = serde_json::from_str(face_alert_json()).unwrap();
        assert_eq!(alert.id, "QE101");
        assert_eq!(alert.status, AlertStatus::Unreviewed);
        match &alert.detail {
            AlertDetail::Face {
                individual,
                prediction,
                ..
            } => {
                assert_eq!(individual.as_ref().unwrap().id, "person-1");
                assert_eq!(*prediction, Some(82.0));
            }
            other => panic!("expected face detail, got {other:?}"),
        }

        let encoded = serde_json::to_string(&alert).unwrap();
        let decoded: Alert = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, alert);
    }

    #[test]
    fn test_concealment_alert_decodes() {
        let alert: Alert = serde_json::from_str(
            r#"{
                "id": "C7",
                "timestamp": "2026-03-01T09:30:00Z",
                "concealment": {
                    "thumbnail": "https://img/t.jpg",
                    "video_url": "https://img/v.mp4",
                    "store": "Camden Shop - Hove",
                    "camera": {"id": "cam-2", "location": "Aisle 3"}
                }
            }"#,
        )
        .unwrap();
        match &alert.detail {
            AlertDetail::Concealment { concealment } => {
                assert_eq!(
                    concealment.store,
                    Some(StoreRef::Label("Camden Shop - Hove".into()))
                );
                assert!(matches!(concealment.camera, Some(CameraRef::Info(_))));
            }
            other => panic!("expected concealment detail, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_status_defaults_to_unreviewed() {
        let alert: Alert = serde_json::from_str(
            r#"{"id": "A1", "timestamp": "2026-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(alert.status, AlertStatus::Unreviewed);
    }

    #[test]
    fn test_decision_wire_names_are_camel_case() {
        let decision = Decision {
            alert_id: "A1".into(),
            decision: AlertStatus::Confirmed,
            action: "confirm_theft".into(),
            enqueued_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["alertId"], "A1");
        assert_eq!(json["decision"], "confirmed");
        assert_eq!(json["enqueuedAt"], "2026-03-01T12:00:00Z");
    }
}
