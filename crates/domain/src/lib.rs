//! # RoadWatch Domain
//!
//! Business domain types and models for RoadWatch.
//!
//! This crate contains:
//! - Detection event types produced by the device collaborators
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other RoadWatch crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
