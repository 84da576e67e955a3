//! Wire types for the backend API

use chrono::{DateTime, Utc};
use roadwatch_domain::{Detection, DetectionEvent, GpsFix, TriggerSource};
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/auth/login`
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /api/auth/refresh`
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response body for both auth endpoints
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Server-reported TTL in seconds
    pub expires_in: i64,
}

/// Response body for `POST /api/detections`
#[derive(Debug, Deserialize)]
pub struct DetectionResponse {
    pub id: String,
}

/// GPS block of the detection payload
#[derive(Debug, Serialize, Deserialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,
    pub fix_quality: u8,
}

impl From<&GpsFix> for LocationPayload {
    fn from(fix: &GpsFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            speed: fix.speed,
            fix_quality: fix.fix_quality,
        }
    }
}

/// Sensor summary block of the detection payload
#[derive(Debug, Serialize, Deserialize)]
pub struct SensorPayload {
    pub ultrasonic_distance_cm: Option<f32>,
    pub vibration: bool,
}

/// Request body for `POST /api/detections`
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectionPayload {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub trigger_source: TriggerSource,
    pub location: Option<LocationPayload>,
    pub detections: Vec<Detection>,
    pub sensor_data: SensorPayload,
    pub detection_count: usize,
    pub max_confidence: f32,
}

impl DetectionPayload {
    /// Build the wire payload for one detection event
    pub fn from_event(device_id: &str, event: &DetectionEvent) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp: event.timestamp,
            trigger_source: event.trigger_source,
            location: event.sensor_snapshot.gps.as_ref().map(LocationPayload::from),
            detections: event.detections.clone(),
            sensor_data: SensorPayload {
                ultrasonic_distance_cm: event.sensor_snapshot.ultrasonic_distance_cm,
                vibration: event.sensor_snapshot.vibration,
            },
            detection_count: event.detections.len(),
            max_confidence: event.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use roadwatch_domain::{BoundingBox, SensorSnapshot};

    use super::*;

    #[test]
    fn test_payload_carries_derived_metadata() {
        let event = DetectionEvent::new(
            Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap(),
            TriggerSource::Camera,
            vec![
                Detection {
                    bbox: BoundingBox { x: 0.0, y: 0.0, width: 0.5, height: 0.5 },
                    confidence: 0.55,
                    class_name: "pothole".to_string(),
                },
                Detection {
                    bbox: BoundingBox { x: 0.5, y: 0.5, width: 0.4, height: 0.4 },
                    confidence: 0.92,
                    class_name: "pothole".to_string(),
                },
            ],
            SensorSnapshot {
                ultrasonic_distance_cm: Some(11.5),
                vibration: true,
                gps: Some(GpsFix {
                    latitude: 57.7,
                    longitude: 11.9,
                    altitude: 12.0,
                    speed: 4.2,
                    fix_quality: 1,
                }),
            },
            None,
        )
        .unwrap();

        let payload = DetectionPayload::from_event("edge-01", &event);

        assert_eq!(payload.device_id, "edge-01");
        assert_eq!(payload.detection_count, 2);
        assert!((payload.max_confidence - 0.92).abs() < f32::EPSILON);
        assert!(payload.location.is_some());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["trigger_source"], "camera");
        assert_eq!(json["sensor_data"]["vibration"], true);
        assert_eq!(json["location"]["latitude"], 57.7);
    }

    #[test]
    fn test_payload_without_gps_fix() {
        let event = DetectionEvent::new(
            Utc::now(),
            TriggerSource::SensorTrigger,
            vec![Detection {
                bbox: BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
                confidence: 0.7,
                class_name: "pothole".to_string(),
            }],
            SensorSnapshot::default(),
            None,
        )
        .unwrap();

        let payload = DetectionPayload::from_event("edge-01", &event);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["location"].is_null());
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let json = r#"{"access_token": "abc", "expires_in": 900}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "abc");
        assert!(response.refresh_token.is_none());
        assert_eq!(response.expires_in, 900);
    }
}
