//! Snapshot store abstraction

use async_trait::async_trait;

use qmesh_core::CostSnapshot;

use crate::error::StorageError;

/// Durable home for one cost table per node
///
/// Keys are node names. A store never exposes a partially written snapshot:
/// `load` returns either the last completed `save` or nothing.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot for `node`
    ///
    /// Returns `Ok(None)` if nothing was ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read or decoded.
    async fn load(&self, node: &str) -> Result<Option<CostSnapshot>, StorageError>;

    /// Replace the saved snapshot for `node`
    async fn save(&self, node: &str, snapshot: &CostSnapshot) -> Result<(), StorageError>;
}
