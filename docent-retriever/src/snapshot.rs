//! Durable snapshot storage for the vector index.
//!
//! The index persists its full entry set as one JSON document after every
//! mutation batch. [`SnapshotStore`] is the seam; [`FileSnapshotStore`] is
//! the production implementation, writing atomically via temp-file + rename.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One indexed vector plus whatever display metadata the indexer attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    /// Free-form metadata carried alongside the vector (document id/name,
    /// chunk index). Not interpreted by the index itself.
    #[serde(default)]
    pub aux: serde_json::Value,
}

impl VectorEntry {
    pub fn new(chunk_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            vector,
            aux: serde_json::Value::Null,
        }
    }

    pub fn with_aux(mut self, aux: serde_json::Value) -> Self {
        self.aux = aux;
        self
    }
}

/// Serialized form of the whole index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimension: Option<usize>,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<VectorEntry>,
}

/// Durable storage seam for [`IndexSnapshot`]s.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the latest snapshot. `Ok(None)` means no snapshot exists yet,
    /// which is not an error.
    async fn load(&self) -> Result<Option<IndexSnapshot>, SnapshotError>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &IndexSnapshot) -> Result<(), SnapshotError>;
}

/// File-backed snapshot store. Saves write to `<path>.tmp` then rename, so a
/// crash mid-write never leaves a torn snapshot behind.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<IndexSnapshot>, SnapshotError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &IndexSnapshot) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec(snapshot)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), entries = snapshot.entries.len(), "snapshot saved");
        Ok(())
    }
}
