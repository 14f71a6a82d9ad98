//! Persisted cost tables

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::StorageError;

/// Destination → neighbor → learned cost.
///
/// Rendered as a JSON object of objects keyed by address strings, sorted so
/// two snapshots of equal tables are byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostSnapshot {
    rows: BTreeMap<Address, BTreeMap<Address, f64>>,
}

impl CostSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one entry
    pub fn insert(&mut self, destination: Address, neighbor: Address, cost: f64) {
        self.rows.entry(destination).or_default().insert(neighbor, cost);
    }

    /// Record a destination with no entries yet
    pub fn insert_row(&mut self, destination: Address) {
        self.rows.entry(destination).or_default();
    }

    pub fn get(&self, destination: &Address, neighbor: &Address) -> Option<f64> {
        self.rows.get(destination)?.get(neighbor).copied()
    }

    pub fn row(&self, destination: &Address) -> Option<&BTreeMap<Address, f64>> {
        self.rows.get(destination)
    }

    /// Iterate `(destination, row)` in address order
    pub fn rows(&self) -> impl Iterator<Item = (&Address, &BTreeMap<Address, f64>)> {
        self.rows.iter()
    }

    /// Number of destinations
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of (destination, neighbor) entries
    pub fn entry_count(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// Pretty JSON document
    pub fn to_json(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec_pretty(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let dest = Address::v4(10, 0, 3, 3);
        let mut snapshot = CostSnapshot::new();
        snapshot.insert(dest, Address::v4(10, 0, 2, 1), 5.0);
        snapshot.insert(dest, Address::v4(10, 0, 1, 2), 3.0);

        let value: serde_json::Value = serde_json::from_slice(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["10.0.3.3"]["10.0.1.2"], 3.0);
        assert_eq!(value["10.0.3.3"]["10.0.2.1"], 5.0);
        assert_eq!(snapshot.entry_count(), 2);
    }

    #[test]
    fn test_from_json_rejects_bad_documents() {
        assert!(CostSnapshot::from_json(b"[1,2,3]").is_err());
        assert!(CostSnapshot::from_json(br#"{"bogus":{"10.0.1.1":1.0}}"#).is_err());
        assert!(CostSnapshot::from_json(br#"{"10.0.1.1":{"10.0.1.2":"x"}}"#).is_err());
        assert!(CostSnapshot::from_json(b"{}").unwrap().is_empty());
    }
}
