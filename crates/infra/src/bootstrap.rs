//! Service wiring
//!
//! Builds the delivery service from configuration: token store, credential
//! manager, backend client and offline store, assembled behind the core
//! port traits.

use std::sync::Arc;

use roadwatch_core::DeliveryService;
use roadwatch_domain::{Config, Result};
use tracing::info;

use crate::api::auth::CredentialManager;
use crate::api::client::BackendClient;
use crate::storage::offline_store::FsOfflineStore;
use crate::storage::token_store::TokenFileStore;

/// Assemble a delivery service from configuration
///
/// Loads any persisted token so the first upload can reuse or refresh it
/// instead of forcing a login. The returned service is not started.
///
/// # Errors
///
/// Returns `DeviceError::Config` if the HTTP clients cannot be built.
pub async fn build_delivery_service(config: &Config) -> Result<DeliveryService> {
    let token_store = TokenFileStore::new(config.storage.token_path.clone());

    let credentials = Arc::new(CredentialManager::new(&config.backend, token_store)?);
    credentials.initialize().await;

    let gateway = Arc::new(BackendClient::new(&config.backend, credentials.clone())?);
    let offline_store = Arc::new(FsOfflineStore::new(config.storage.offline_dir.clone()));

    info!(
        device_id = %config.backend.device_id,
        backend = %config.backend.base_url,
        "Delivery service assembled"
    );

    Ok(DeliveryService::new(gateway, credentials, offline_store, config.delivery.clone()))
}
