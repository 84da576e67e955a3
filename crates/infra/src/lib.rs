//! # RoadWatch Infra
//!
//! Infrastructure adapters for the RoadWatch delivery subsystem:
//! - Backend HTTP client and credential manager (reqwest)
//! - Filesystem token store and offline record store
//! - Configuration loader (environment first, file fallback)
//! - Tracing bootstrap and service wiring

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod observability;
pub mod storage;

pub use api::auth::CredentialManager;
pub use api::client::BackendClient;
pub use bootstrap::build_delivery_service;
pub use storage::offline_store::FsOfflineStore;
pub use storage::token_store::TokenFileStore;
