//! Shared storage for the last analysis outcome.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::results::PersistedSummary;

/// Process-wide store holding a single [`PersistedSummary`]
#[async_trait]
pub trait SummaryStorage: Send + Sync {
    /// The stored summary, or `None` if nothing was analyzed yet
    async fn load(&self) -> Result<Option<PersistedSummary>, StorageError>;

    /// Replace the stored summary
    async fn save(&self, summary: &PersistedSummary) -> Result<(), StorageError>;
}

/// Storage that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<PersistedSummary>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<PersistedSummary>, StorageError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, summary: &PersistedSummary) -> Result<(), StorageError> {
        *self.slot.lock().await = Some(summary.clone());
        Ok(())
    }
}

/// Storage backed by a JSON document on disk, so the summary survives restarts
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // serializes writers within this process
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SummaryStorage for FileStorage {
    async fn load(&self) -> Result<Option<PersistedSummary>, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn save(&self, summary: &PersistedSummary) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_string_pretty(summary)?;

        // readers never observe a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        ::log::debug!("Summary saved to {}", self.path.display());
        Ok(())
    }
}
