//! Delivery statistics
//!
//! Process-wide counters mutated only by the upload worker after each
//! attempt; read-only everywhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery subsystem statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Total delivery attempts, including the bounded retry after re-login
    pub total_attempts: u64,
    /// Detections confirmed by the backend
    pub successful_uploads: u64,
    /// Attempts that ended in an offline archive
    pub failed_uploads: u64,
    /// Time of the last confirmed delivery
    pub last_success_at: Option<DateTime<Utc>>,
    /// Last classified delivery error
    pub last_error: Option<String>,
    /// Tasks currently waiting in the upload queue
    pub queue_depth: usize,
    /// Records currently archived in the offline store
    pub offline_records: usize,
}

impl DeliveryStats {
    /// Record one delivery attempt
    pub fn record_attempt(&mut self) {
        self.total_attempts += 1;
    }

    /// Record a confirmed delivery
    pub fn record_success(&mut self) {
        self.successful_uploads += 1;
        self.last_success_at = Some(Utc::now());
    }

    /// Record a failed delivery with its classified error
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed_uploads += 1;
        self.last_error = Some(error.into());
    }
}
