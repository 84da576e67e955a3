//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! delivery subsystem.

// Credential lifecycle
pub const TOKEN_REUSE_MARGIN_SECS: i64 = 300;
pub const TOKEN_TTL_SKEW_SECS: i64 = 60;

// Worker timings
pub const DEFAULT_QUEUE_WAIT_MS: u64 = 1_000;
pub const WORKER_JOIN_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REDRAIN_INTERVAL_SECS: u64 = 300;

// HTTP timeouts (short for auth/health, longer for uploads)
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 60;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

// Offline store file naming
pub const OFFLINE_RECORD_PREFIX: &str = "detection_";
pub const OFFLINE_RECORD_EXT: &str = "json";
pub const QUARANTINE_EXT: &str = "corrupt";
