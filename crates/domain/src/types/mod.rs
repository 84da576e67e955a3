//! Domain data types

pub mod auth;
pub mod detection;
pub mod stats;

pub use auth::TokenSet;
pub use detection::{BoundingBox, Detection, DetectionEvent, GpsFix, SensorSnapshot, TriggerSource};
pub use stats::DeliveryStats;
