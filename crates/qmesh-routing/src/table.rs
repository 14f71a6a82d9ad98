//! Learned cost table
//!
//! The [`CostTable`] maps destination → neighbor → estimated cost of
//! delivering through that neighbor. Rows are created lazily the first time
//! a destination is referenced, with every current neighbor set to the
//! initial (optimistic) cost. Entries are never removed.
//!
//! Rows live in a sharded map so updates for different destinations proceed
//! in parallel. A table-wide gate is held shared by every mutation and
//! exclusively by [`CostTable::snapshot`], so a snapshot always reflects a
//! prefix of completed updates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use qmesh_core::{Address, CostSnapshot, NeighborSet};

/// Cost every entry starts from
pub const DEFAULT_INITIAL_COST: f64 = 5.0;

/// Previous and new value of an updated entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostUpdate {
    pub previous: f64,
    pub current: f64,
}

/// Per-node learned cost table
pub struct CostTable {
    /// Neighbors known at startup, in tie-break order
    neighbors: NeighborSet,
    /// Value for entries never individually updated
    initial_cost: f64,
    /// Rows keyed by destination
    rows: DashMap<Address, HashMap<Address, f64>>,
    /// Shared by mutations, exclusive for snapshots
    cut: RwLock<()>,
    /// Bumped on every mutation
    version: AtomicU64,
}

impl CostTable {
    /// Create an empty table
    pub fn new(neighbors: NeighborSet, initial_cost: f64) -> Self {
        Self {
            neighbors,
            initial_cost,
            rows: DashMap::new(),
            cut: RwLock::new(()),
            version: AtomicU64::new(0),
        }
    }

    /// Restore a table from a snapshot
    ///
    /// Entries for nodes that are no longer neighbors are kept as they were.
    pub fn from_snapshot(neighbors: NeighborSet, initial_cost: f64, snapshot: &CostSnapshot) -> Self {
        let table = Self::new(neighbors, initial_cost);
        for (destination, row) in snapshot.rows() {
            let entries = row.iter().map(|(n, cost)| (*n, *cost)).collect();
            table.rows.insert(*destination, entries);
        }
        table
    }

    pub fn neighbors(&self) -> &NeighborSet {
        &self.neighbors
    }

    pub fn initial_cost(&self) -> f64 {
        self.initial_cost
    }

    /// Initialize `destination` if it was never referenced.
    ///
    /// Returns `true` if a row was created. Never resets learned values.
    pub fn ensure(&self, destination: &Address) -> bool {
        if self.rows.contains_key(destination) {
            return false;
        }
        let _cut = self.cut.read();
        match self.rows.entry(*destination) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(self.fresh_row());
                self.version.fetch_add(1, Ordering::Release);
                true
            }
        }
    }

    /// Whether `destination` was ever referenced
    pub fn contains(&self, destination: &Address) -> bool {
        self.rows.contains_key(destination)
    }

    /// Current estimate for delivering to `destination` via `neighbor`
    ///
    /// Returns the initial cost for entries never individually updated.
    pub fn get(&self, destination: &Address, neighbor: &Address) -> f64 {
        self.rows
            .get(destination)
            .and_then(|row| row.get(neighbor).copied())
            .unwrap_or(self.initial_cost)
    }

    /// Lowest estimate over the current neighbors
    ///
    /// `None` if the destination was never referenced. With no neighbors the
    /// initial cost is reported.
    pub fn best_cost(&self, destination: &Address) -> Option<f64> {
        let row = self.rows.get(destination)?;
        if self.neighbors.is_empty() {
            return Some(self.initial_cost);
        }
        let best = self
            .neighbors
            .iter()
            .map(|n| row.get(n).copied().unwrap_or(self.initial_cost))
            .fold(f64::INFINITY, f64::min);
        Some(best)
    }

    /// Estimates for `destination` over the current neighbors, in neighbor
    /// order
    pub fn costs(&self, destination: &Address) -> Vec<(Address, f64)> {
        let row = self.rows.get(destination);
        self.neighbors
            .iter()
            .map(|n| {
                let cost = row
                    .as_ref()
                    .and_then(|r| r.get(n).copied())
                    .unwrap_or(self.initial_cost);
                (*n, cost)
            })
            .collect()
    }

    /// Atomically replace one entry with `f(current)`
    ///
    /// The destination row is initialized first if needed. The row stays
    /// locked for the whole read-modify-write.
    pub fn update_with<F>(&self, destination: &Address, neighbor: &Address, f: F) -> CostUpdate
    where
        F: FnOnce(f64) -> f64,
    {
        let _cut = self.cut.read();
        let mut row = self
            .rows
            .entry(*destination)
            .or_insert_with(|| self.fresh_row());
        let previous = row.get(neighbor).copied().unwrap_or(self.initial_cost);
        let current = f(previous);
        row.insert(*neighbor, current);
        drop(row);
        self.version.fetch_add(1, Ordering::Release);
        CostUpdate { previous, current }
    }

    /// Overwrite one entry
    pub fn set(&self, destination: &Address, neighbor: &Address, cost: f64) -> CostUpdate {
        self.update_with(destination, neighbor, |_| cost)
    }

    /// Consistent copy of the whole table and the version it reflects
    pub fn snapshot_versioned(&self) -> (u64, CostSnapshot) {
        let _cut = self.cut.write();
        let mut snapshot = CostSnapshot::new();
        for row in self.rows.iter() {
            snapshot.insert_row(*row.key());
            for (neighbor, cost) in row.value() {
                snapshot.insert(*row.key(), *neighbor, *cost);
            }
        }
        (self.version.load(Ordering::Acquire), snapshot)
    }

    /// Consistent copy of the whole table
    pub fn snapshot(&self) -> CostSnapshot {
        self.snapshot_versioned().1
    }

    /// Number of mutations applied since construction
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Referenced destinations, sorted
    pub fn destinations(&self) -> Vec<Address> {
        let mut out: Vec<Address> = self.rows.iter().map(|row| *row.key()).collect();
        out.sort();
        out
    }

    /// Number of referenced destinations
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn fresh_row(&self) -> HashMap<Address, f64> {
        self.neighbors
            .iter()
            .map(|n| (*n, self.initial_cost))
            .collect()
    }
}

impl std::fmt::Debug for CostTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTable")
            .field("neighbors", &self.neighbors.len())
            .field("destinations", &self.rows.len())
            .field("version", &self.version())
            .finish()
    }
}
