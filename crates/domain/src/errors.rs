//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for RoadWatch
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DeviceError {
    /// Login and refresh both failed, or the auth service was unreachable.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A data call came back 401. Eligible for one re-login retry.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-2xx application response (403, 429, 5xx, ...).
    #[error("Server rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for RoadWatch operations
pub type Result<T> = std::result::Result<T, DeviceError>;
