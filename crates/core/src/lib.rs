//! # RoadWatch Core
//!
//! Delivery orchestration for the RoadWatch edge device: the upload queue,
//! the single delivery worker, the outcome classification policy, and the
//! port traits the infrastructure layer implements.
//!
//! ## Architecture
//! - Depends only on `roadwatch-domain`
//! - All I/O goes through the port traits in [`delivery::ports`]

pub mod delivery;

pub use delivery::ports::{AuthSession, DetectionGateway, DetectionReceipt, OfflineStore};
pub use delivery::service::DeliveryService;
