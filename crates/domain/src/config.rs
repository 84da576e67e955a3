//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_IMAGE_TIMEOUT_SECS, DEFAULT_QUEUE_WAIT_MS,
    DEFAULT_REDRAIN_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Remote management service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub device_id: String,
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,
}

/// Local durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub offline_dir: PathBuf,
    pub token_path: PathBuf,
}

/// Upload worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Bounded wait for the next queued task, in milliseconds
    #[serde(default = "default_queue_wait_ms")]
    pub queue_wait_ms: u64,
    /// Archive still-queued tasks to the offline store on `stop()`
    #[serde(default = "default_flush_on_shutdown")]
    pub flush_on_shutdown: bool,
    /// Interval for re-draining archived records without a restart.
    /// `None` disables periodic re-drain.
    #[serde(default = "default_redrain_interval")]
    pub redrain_interval_secs: Option<u64>,
}

impl DeliveryConfig {
    /// Bounded queue wait as a [`Duration`]
    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(self.queue_wait_ms)
    }

    /// Re-drain interval as a [`Duration`], if enabled
    pub fn redrain_interval(&self) -> Option<Duration> {
        self.redrain_interval_secs.map(Duration::from_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_wait_ms: default_queue_wait_ms(),
            flush_on_shutdown: default_flush_on_shutdown(),
            redrain_interval_secs: default_redrain_interval(),
        }
    }
}

fn default_auth_timeout() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_image_timeout() -> u64 {
    DEFAULT_IMAGE_TIMEOUT_SECS
}

fn default_queue_wait_ms() -> u64 {
    DEFAULT_QUEUE_WAIT_MS
}

fn default_flush_on_shutdown() -> bool {
    true
}

fn default_redrain_interval() -> Option<u64> {
    Some(DEFAULT_REDRAIN_INTERVAL_SECS)
}
