//! Filesystem offline record store
//!
//! One JSON file per undelivered detection, named after the event
//! timestamp so a directory listing replays in arrival order. Records
//! are written through a temp file and renamed into place, and only
//! removed after the drain has requeued them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use roadwatch_core::OfflineStore;
use roadwatch_domain::constants::{OFFLINE_RECORD_EXT, QUARANTINE_EXT};
use roadwatch_domain::{DetectionEvent, DeviceError, Result};
use tracing::{debug, instrument};

use super::token_store::write_durably;

/// Directory-backed offline store
#[derive(Debug, Clone)]
pub struct FsOfflineStore {
    dir: PathBuf,
}

impl FsOfflineStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            DeviceError::Persistence(format!(
                "failed to create offline directory {}: {e}",
                self.dir.display()
            ))
        })
    }

    /// Pick a record path that does not collide with an existing one
    ///
    /// Two events can share a millisecond timestamp; suffix a counter
    /// rather than overwrite the earlier record.
    fn unique_path(&self, stem: &str) -> PathBuf {
        let candidate = self.dir.join(format!("{stem}.{OFFLINE_RECORD_EXT}"));
        if !candidate.exists() {
            return candidate;
        }
        let mut n = 1u32;
        loop {
            let candidate = self.dir.join(format!("{stem}-{n}.{OFFLINE_RECORD_EXT}"));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

#[async_trait]
impl OfflineStore for FsOfflineStore {
    #[instrument(skip(self, event))]
    async fn archive(&self, event: &DetectionEvent) -> Result<PathBuf> {
        self.ensure_dir().await?;

        let json = serde_json::to_string_pretty(event)
            .map_err(|e| DeviceError::Persistence(format!("failed to serialize event: {e}")))?;

        let path = self.unique_path(&event.offline_file_stem());
        let tmp_path = path.with_extension("tmp");
        write_durably(&tmp_path, json.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            DeviceError::Persistence(format!(
                "failed to move record into place {}: {e}",
                path.display()
            ))
        })?;

        debug!(path = %path.display(), "Archived detection offline");
        Ok(path)
    }

    async fn list(&self) -> Result<Vec<PathBuf>> {
        self.ensure_dir().await?;

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            DeviceError::Persistence(format!(
                "failed to list offline directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            DeviceError::Persistence(format!("failed to read directory entry: {e}"))
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(OFFLINE_RECORD_EXT) {
                records.push(path);
            }
        }

        // Timestamp-derived names, so lexical order is arrival order
        records.sort();
        Ok(records)
    }

    async fn load(&self, path: &Path) -> Result<DetectionEvent> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            DeviceError::Persistence(format!("failed to read record {}: {e}", path.display()))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            DeviceError::Persistence(format!("failed to parse record {}: {e}", path.display()))
        })
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await.map_err(|e| {
            DeviceError::Persistence(format!("failed to remove record {}: {e}", path.display()))
        })
    }

    async fn quarantine(&self, path: &Path) -> Result<()> {
        let target = path.with_extension(QUARANTINE_EXT);
        tokio::fs::rename(path, &target).await.map_err(|e| {
            DeviceError::Persistence(format!(
                "failed to quarantine record {}: {e}",
                path.display()
            ))
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}
