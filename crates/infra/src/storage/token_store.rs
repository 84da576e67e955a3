//! Durable token persistence
//!
//! Stores the current token set as a single JSON file so the device can
//! come back from a reboot without a fresh login. Writes go through a
//! temp file and an atomic rename; a torn write can never leave a
//! half-written token behind.

use std::path::PathBuf;

use roadwatch_domain::{DeviceError, Result, TokenSet};
use tracing::warn;

/// JSON-file backed token store
#[derive(Debug, Clone)]
pub struct TokenFileStore {
    path: PathBuf,
}

impl TokenFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted token set, if any
    ///
    /// A missing file and a corrupt file both come back as `None`; the
    /// caller falls through to a fresh login either way. Only real IO
    /// failures are surfaced.
    pub async fn load(&self) -> Result<Option<TokenSet>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DeviceError::Persistence(format!(
                    "failed to read token file {}: {e}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_str(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable token file");
                Ok(None)
            }
        }
    }

    /// Persist the token set atomically
    pub async fn save(&self, token: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DeviceError::Persistence(format!(
                    "failed to create token directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(token)
            .map_err(|e| DeviceError::Persistence(format!("failed to serialize token set: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        write_durably(&tmp_path, json.as_bytes()).await?;

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            DeviceError::Persistence(format!(
                "failed to move token file into place {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// Write bytes and fsync before the caller renames the file into place
pub(crate) async fn write_durably(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| {
        DeviceError::Persistence(format!("failed to create {}: {e}", path.display()))
    })?;

    use tokio::io::AsyncWriteExt;
    file.write_all(bytes).await.map_err(|e| {
        DeviceError::Persistence(format!("failed to write {}: {e}", path.display()))
    })?;
    file.sync_all().await.map_err(|e| {
        DeviceError::Persistence(format!("failed to sync {}: {e}", path.display()))
    })
}
