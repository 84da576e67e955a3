//! Detection event types
//!
//! A `DetectionEvent` is the unit of delivery: one reported pothole sighting
//! with its sensor and location context. Events are created by the detection
//! collaborator, validated on construction, and immutable afterwards.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::OFFLINE_RECORD_PREFIX;
use crate::errors::{DeviceError, Result};

/// What caused the detection pipeline to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Camera,
    SensorTrigger,
}

/// Bounding box in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One classified region within a detection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_name: String,
}

/// GPS fix captured at detection time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,
    pub fix_quality: u8,
}

/// Sensor readings captured alongside a detection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub ultrasonic_distance_cm: Option<f32>,
    pub vibration: bool,
    pub gps: Option<GpsFix>,
}

/// One reported pothole sighting
///
/// Invariants, enforced by [`DetectionEvent::new`]:
/// - `detections` is non-empty
/// - `confidence` equals the maximum confidence among `detections`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub timestamp: DateTime<Utc>,
    pub trigger_source: TriggerSource,
    pub detections: Vec<Detection>,
    pub sensor_snapshot: SensorSnapshot,
    pub confidence: f32,
    pub image_path: Option<PathBuf>,
}

impl DetectionEvent {
    /// Create a validated detection event
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidInput` if `detections` is empty.
    pub fn new(
        timestamp: DateTime<Utc>,
        trigger_source: TriggerSource,
        detections: Vec<Detection>,
        sensor_snapshot: SensorSnapshot,
        image_path: Option<PathBuf>,
    ) -> Result<Self> {
        if detections.is_empty() {
            return Err(DeviceError::InvalidInput(
                "detection event requires at least one detection".to_string(),
            ));
        }

        let confidence = detections.iter().map(|d| d.confidence).fold(f32::MIN, f32::max);

        Ok(Self { timestamp, trigger_source, detections, sensor_snapshot, confidence, image_path })
    }

    /// Stable, path-safe file stem derived from the event timestamp
    ///
    /// Millisecond precision keeps concurrent events apart; path-unsafe
    /// characters (`:` and `.`) are substituted.
    pub fn offline_file_stem(&self) -> String {
        let ts = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        format!("{}{}", OFFLINE_RECORD_PREFIX, ts.replace([':', '.'], "-"))
    }
}
