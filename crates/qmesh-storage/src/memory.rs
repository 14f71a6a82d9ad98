//! In-memory snapshot store
//!
//! Keeps snapshots in a concurrent map. Used by tests and by the simulation,
//! where nothing needs to outlive the process.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use qmesh_core::CostSnapshot;

use crate::error::StorageError;
use crate::traits::SnapshotStore;

/// In-memory snapshot store
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: DashMap<String, CostSnapshot>,
    saves: AtomicU64,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot as if it had been saved earlier
    pub fn insert(&self, node: impl Into<String>, snapshot: CostSnapshot) {
        self.snapshots.insert(node.into(), snapshot);
    }

    /// Latest snapshot for `node`
    pub fn get(&self, node: &str) -> Option<CostSnapshot> {
        self.snapshots.get(node).map(|entry| entry.value().clone())
    }

    /// Number of completed saves across all nodes
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Acquire)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, node: &str) -> Result<Option<CostSnapshot>, StorageError> {
        Ok(self.get(node))
    }

    async fn save(&self, node: &str, snapshot: &CostSnapshot) -> Result<(), StorageError> {
        self.snapshots.insert(node.to_string(), snapshot.clone());
        self.saves.fetch_add(1, Ordering::Release);
        Ok(())
    }
}
