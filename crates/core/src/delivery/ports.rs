//! Port interfaces for delivery operations

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use roadwatch_domain::{DetectionEvent, Result};

/// Server acknowledgement for a submitted detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionReceipt {
    /// Server-assigned detection id, used for the image companion upload
    pub id: String,
}

/// Trait for the remote detection API
#[async_trait]
pub trait DetectionGateway: Send + Sync {
    /// Submit one detection event, expecting a created acknowledgement
    async fn submit_detection(&self, event: &DetectionEvent) -> Result<DetectionReceipt>;

    /// Attach an image to an already-submitted detection (best-effort)
    async fn upload_image(&self, detection_id: &str, image_path: &Path) -> Result<()>;

    /// Connectivity/auth smoke test
    async fn health_check(&self) -> Result<bool>;
}

/// Trait for forcing a fresh credential exchange
///
/// Used by the worker when a data call comes back 401: one forced login,
/// then exactly one retry.
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Perform a full login, replacing any cached credential
    async fn force_login(&self) -> Result<()>;
}

/// Trait for the durable offline spill-over store
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Durably archive an event; returns the record path
    async fn archive(&self, event: &DetectionEvent) -> Result<PathBuf>;

    /// List archived records in directory (arrival) order
    async fn list(&self) -> Result<Vec<PathBuf>>;

    /// Load one archived record
    async fn load(&self, path: &Path) -> Result<DetectionEvent>;

    /// Delete a record after it has been requeued or delivered
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Set a poison record aside so future drains skip it
    async fn quarantine(&self, path: &Path) -> Result<()>;

    /// Number of archived records
    async fn count(&self) -> Result<usize>;
}
