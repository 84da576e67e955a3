//! Configuration loader
//!
//! Loads device configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `ROADWATCH_BACKEND_URL`: Base URL of the management backend
//! - `ROADWATCH_USERNAME`: Device account username
//! - `ROADWATCH_PASSWORD`: Device account password
//! - `ROADWATCH_DEVICE_ID`: Stable device identifier
//! - `ROADWATCH_OFFLINE_DIR`: Directory for offline detection records
//! - `ROADWATCH_TOKEN_PATH`: Path of the persisted token file
//! - `ROADWATCH_AUTH_TIMEOUT_SECS`: Auth request timeout (optional)
//! - `ROADWATCH_REQUEST_TIMEOUT_SECS`: Detection request timeout (optional)
//! - `ROADWATCH_IMAGE_TIMEOUT_SECS`: Image upload timeout (optional)
//! - `ROADWATCH_QUEUE_WAIT_MS`: Worker queue wait in milliseconds (optional)
//! - `ROADWATCH_FLUSH_ON_SHUTDOWN`: Archive queued tasks on stop (optional, true/false)
//! - `ROADWATCH_REDRAIN_INTERVAL_SECS`: Offline re-drain interval, `0` disables (optional)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./roadwatch.json` or `./roadwatch.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};

use roadwatch_domain::constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_IMAGE_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use roadwatch_domain::{
    BackendConfig, Config, DeliveryConfig, DeviceError, Result, StorageConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `DeviceError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Returns an error
/// if any are missing.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `DeviceError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let base_url = env_var("ROADWATCH_BACKEND_URL")?;
    let username = env_var("ROADWATCH_USERNAME")?;
    let password = env_var("ROADWATCH_PASSWORD")?;
    let device_id = env_var("ROADWATCH_DEVICE_ID")?;
    let offline_dir = env_var("ROADWATCH_OFFLINE_DIR")?;
    let token_path = env_var("ROADWATCH_TOKEN_PATH")?;

    let defaults = DeliveryConfig::default();
    let delivery = DeliveryConfig {
        queue_wait_ms: env_u64("ROADWATCH_QUEUE_WAIT_MS")?.unwrap_or(defaults.queue_wait_ms),
        flush_on_shutdown: env_bool("ROADWATCH_FLUSH_ON_SHUTDOWN", defaults.flush_on_shutdown),
        redrain_interval_secs: match env_u64("ROADWATCH_REDRAIN_INTERVAL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(secs),
            None => defaults.redrain_interval_secs,
        },
    };

    Ok(Config {
        backend: BackendConfig {
            base_url,
            username,
            password,
            device_id,
            auth_timeout_secs: env_u64("ROADWATCH_AUTH_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_AUTH_TIMEOUT_SECS),
            request_timeout_secs: env_u64("ROADWATCH_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            image_timeout_secs: env_u64("ROADWATCH_IMAGE_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_IMAGE_TIMEOUT_SECS),
        },
        storage: StorageConfig {
            offline_dir: PathBuf::from(offline_dir),
            token_path: PathBuf::from(token_path),
        },
        delivery,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `DeviceError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DeviceError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DeviceError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DeviceError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DeviceError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DeviceError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DeviceError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("roadwatch.json"),
            cwd.join("roadwatch.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("roadwatch.json"),
                exe_dir.join("roadwatch.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| DeviceError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse optional numeric environment variable
fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|e| DeviceError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED_VARS: &[&str] = &[
        "ROADWATCH_BACKEND_URL",
        "ROADWATCH_USERNAME",
        "ROADWATCH_PASSWORD",
        "ROADWATCH_DEVICE_ID",
        "ROADWATCH_OFFLINE_DIR",
        "ROADWATCH_TOKEN_PATH",
    ];

    fn set_required_vars() {
        std::env::set_var("ROADWATCH_BACKEND_URL", "http://localhost:8080");
        std::env::set_var("ROADWATCH_USERNAME", "device");
        std::env::set_var("ROADWATCH_PASSWORD", "secret");
        std::env::set_var("ROADWATCH_DEVICE_ID", "edge-01");
        std::env::set_var("ROADWATCH_OFFLINE_DIR", "/tmp/roadwatch/offline");
        std::env::set_var("ROADWATCH_TOKEN_PATH", "/tmp/roadwatch/token.json");
    }

    fn clear_vars() {
        for key in REQUIRED_VARS {
            std::env::remove_var(key);
        }
        std::env::remove_var("ROADWATCH_QUEUE_WAIT_MS");
        std::env::remove_var("ROADWATCH_FLUSH_ON_SHUTDOWN");
        std::env::remove_var("ROADWATCH_REDRAIN_INTERVAL_SECS");
        std::env::remove_var("ROADWATCH_REQUEST_TIMEOUT_SECS");
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("TEST_BOOL_TRUE", "yes");
        std::env::set_var("TEST_BOOL_FALSE", "off");

        assert!(env_bool("TEST_BOOL_TRUE", false));
        assert!(!env_bool("TEST_BOOL_FALSE", true));

        std::env::remove_var("TEST_BOOL_MISSING");
        assert!(env_bool("TEST_BOOL_MISSING", true));
        assert!(!env_bool("TEST_BOOL_MISSING", false));

        std::env::remove_var("TEST_BOOL_TRUE");
        std::env::remove_var("TEST_BOOL_FALSE");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        set_required_vars();
        std::env::set_var("ROADWATCH_QUEUE_WAIT_MS", "250");
        std::env::set_var("ROADWATCH_FLUSH_ON_SHUTDOWN", "false");
        std::env::set_var("ROADWATCH_REQUEST_TIMEOUT_SECS", "15");

        let config = load_from_env().expect("should load config from env vars");
        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.device_id, "edge-01");
        assert_eq!(config.backend.request_timeout_secs, 15);
        assert_eq!(config.backend.auth_timeout_secs, 10);
        assert_eq!(config.storage.token_path, PathBuf::from("/tmp/roadwatch/token.json"));
        assert_eq!(config.delivery.queue_wait_ms, 250);
        assert!(!config.delivery.flush_on_shutdown);
        assert_eq!(config.delivery.redrain_interval_secs, Some(300));

        clear_vars();
    }

    #[test]
    fn test_redrain_zero_disables_periodic_drain() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        set_required_vars();
        std::env::set_var("ROADWATCH_REDRAIN_INTERVAL_SECS", "0");

        let config = load_from_env().expect("should load config from env vars");
        assert_eq!(config.delivery.redrain_interval_secs, None);

        clear_vars();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        clear_vars();
        let result = load_from_env();
        assert!(matches!(result, Err(DeviceError::Config(_))));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        set_required_vars();
        std::env::set_var("ROADWATCH_QUEUE_WAIT_MS", "not-a-number");

        let result = load_from_env();
        assert!(matches!(result, Err(DeviceError::Config(_))));

        clear_vars();
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "backend": {
                "base_url": "http://localhost:8080",
                "username": "device",
                "password": "secret",
                "device_id": "edge-01"
            },
            "storage": {
                "offline_dir": "/var/lib/roadwatch/offline",
                "token_path": "/var/lib/roadwatch/token.json"
            }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("should load JSON config");
        assert_eq!(config.backend.device_id, "edge-01");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.delivery.queue_wait_ms, 1_000);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[backend]
base_url = "http://localhost:8080"
username = "device"
password = "secret"
device_id = "edge-02"

[storage]
offline_dir = "/var/lib/roadwatch/offline"
token_path = "/var/lib/roadwatch/token.json"

[delivery]
queue_wait_ms = 500
flush_on_shutdown = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("should load TOML config");
        assert_eq!(config.backend.device_id, "edge-02");
        assert_eq!(config.delivery.queue_wait_ms, 500);
        assert!(!config.delivery.flush_on_shutdown);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(DeviceError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let invalid_json = r#"{ "this is": "not valid json" "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_json.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_err(), "Should fail with invalid JSON");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
