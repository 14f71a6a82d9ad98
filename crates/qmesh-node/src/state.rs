//! Per-process router state

use tracing::{info, warn};

use qmesh_core::{Address, CostSnapshot, NeighborSet};
use qmesh_routing::{CostTable, QRouter};
use qmesh_storage::SnapshotStore;

use crate::config::NodeConfig;
use crate::error::NodeResult;

/// Everything a node's workers share: its identity and its router
#[derive(Debug)]
pub struct NodeState {
    name: String,
    router: QRouter,
}

impl NodeState {
    pub fn new(name: impl Into<String>, router: QRouter) -> Self {
        Self {
            name: name.into(),
            router,
        }
    }

    /// Build the state for `config`, restoring the last saved table
    ///
    /// A missing snapshot starts an empty table. An unreadable one is
    /// logged and also starts an empty table.
    pub async fn load(config: &NodeConfig, store: &dyn SnapshotStore) -> NodeResult<Self> {
        let address = config.address()?;
        let name = config.node_name()?;
        let neighbors = config.neighbors()?;

        let snapshot = match store.load(&name).await {
            Ok(Some(snapshot)) => {
                info!(
                    node = %name,
                    destinations = snapshot.len(),
                    entries = snapshot.entry_count(),
                    "Restored cost table"
                );
                snapshot
            }
            Ok(None) => CostSnapshot::new(),
            Err(e) => {
                warn!(node = %name, error = %e, "Could not load saved cost table, starting empty");
                CostSnapshot::new()
            }
        };

        let router = QRouter::with_snapshot(address, neighbors, &config.router, &snapshot)?;
        Ok(Self::new(name, router))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.router.address()
    }

    pub fn neighbors(&self) -> &NeighborSet {
        self.router.neighbors()
    }

    pub fn router(&self) -> &QRouter {
        &self.router
    }

    pub fn table(&self) -> &CostTable {
        self.router.table()
    }
}
