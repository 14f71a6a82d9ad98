//! JSON file snapshot store
//!
//! One pretty-printed JSON document per node, `q_table_<node>.json`, inside
//! a base directory. Writes go to a temporary file in the same directory
//! which is synced and renamed over the target, so a reader only ever sees
//! a complete document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use qmesh_core::CostSnapshot;

use crate::error::StorageError;
use crate::traits::SnapshotStore;

/// File-backed snapshot store
#[derive(Debug)]
pub struct JsonFileStore {
    base_dir: PathBuf,
    /// Distinguishes temporary files of overlapping saves
    write_seq: AtomicU64,
}

impl JsonFileStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;

        info!(path = %base_dir.display(), "Snapshot store initialized");

        Ok(Self {
            base_dir,
            write_seq: AtomicU64::new(0),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the snapshot for `node`
    pub fn snapshot_path(&self, node: &str) -> Result<PathBuf, StorageError> {
        validate_node_key(node)?;
        Ok(self.base_dir.join(format!("q_table_{node}.json")))
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    #[instrument(skip(self))]
    async fn load(&self, node: &str) -> Result<Option<CostSnapshot>, StorageError> {
        let path = self.snapshot_path(node)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = CostSnapshot::from_json(&bytes)?;
        debug!(
            path = %path.display(),
            destinations = snapshot.len(),
            entries = snapshot.entry_count(),
            "Loaded snapshot"
        );
        Ok(Some(snapshot))
    }

    #[instrument(skip(self, snapshot), fields(destinations = snapshot.len()))]
    async fn save(&self, node: &str, snapshot: &CostSnapshot) -> Result<(), StorageError> {
        let path = self.snapshot_path(node)?;
        let bytes = snapshot.to_json()?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp_path = self.base_dir.join(format!(".q_table_{node}.json.{seq}.tmp"));

        let result = async {
            let mut file = File::create(&temp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = bytes.len(), "Saved snapshot");
        Ok(())
    }
}

/// Check that `node` can name a snapshot file inside the state directory
pub fn validate_node_key(node: &str) -> Result<(), StorageError> {
    let bad = node.is_empty()
        || node == "."
        || node == ".."
        || node.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
    if bad {
        Err(StorageError::invalid_key(node))
    } else {
        Ok(())
    }
}
