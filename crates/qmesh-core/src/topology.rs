//! Neighbor sets
//!
//! A node never learns the global topology. All it knows is the fixed set
//! of nodes one link away, computed once at startup.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Ordered, duplicate-free set of a node's direct neighbors.
///
/// Iteration order is fixed at construction and is the tie-break order
/// for forwarding decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Address>", into = "Vec<Address>")]
pub struct NeighborSet {
    members: Vec<Address>,
}

impl NeighborSet {
    /// Create an empty neighbor set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a neighbor set for `own`, dropping duplicates and `own` itself
    /// while preserving first-seen order.
    pub fn for_node(own: &Address, neighbors: impl IntoIterator<Item = Address>) -> Self {
        let mut set = Self::new();
        for neighbor in neighbors {
            if neighbor != *own {
                set.insert(neighbor);
            }
        }
        set
    }

    /// Append a neighbor if not already present; returns whether it was added
    pub fn insert(&mut self, address: Address) -> bool {
        if self.members.contains(&address) {
            return false;
        }
        self.members.push(address);
        true
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.members.contains(address)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.members.iter()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.members
    }

    /// Neighbors other than `excluded`, in set order
    pub fn excluding(&self, excluded: Option<&Address>) -> Vec<Address> {
        self.members
            .iter()
            .filter(|n| Some(*n) != excluded)
            .copied()
            .collect()
    }
}

impl From<Vec<Address>> for NeighborSet {
    fn from(members: Vec<Address>) -> Self {
        let mut set = Self::new();
        for member in members {
            set.insert(member);
        }
        set
    }
}

impl From<NeighborSet> for Vec<Address> {
    fn from(set: NeighborSet) -> Self {
        set.members
    }
}

impl FromIterator<Address> for NeighborSet {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        let mut set = Self::new();
        for member in iter {
            set.insert(member);
        }
        set
    }
}

impl<'a> IntoIterator for &'a NeighborSet {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(c: u8, d: u8) -> Address {
        Address::v4(10, 0, c, d)
    }

    #[test]
    fn test_for_node_dedups_and_skips_self() {
        let own = addr(1, 1);
        let set = NeighborSet::for_node(&own, vec![addr(2, 1), own, addr(1, 2), addr(2, 1)]);
        assert_eq!(set.as_slice(), &[addr(2, 1), addr(1, 2)]);
        assert!(!set.contains(&own));
    }

    #[test]
    fn test_excluding_preserves_order() {
        let set: NeighborSet = vec![addr(1, 2), addr(3, 2), addr(2, 1), addr(2, 3)].into();
        assert_eq!(
            set.excluding(Some(&addr(3, 2))),
            vec![addr(1, 2), addr(2, 1), addr(2, 3)]
        );
        assert_eq!(set.excluding(None).len(), 4);
        assert_eq!(set.excluding(Some(&addr(9, 9))).len(), 4);
    }

    #[test]
    fn test_serde_as_list() {
        let set: NeighborSet = vec![addr(1, 2), addr(2, 1)].into();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["10.0.1.2","10.0.2.1"]"#);
        let back: NeighborSet = serde_json::from_str(r#"["10.0.1.2","10.0.1.2"]"#).unwrap();
        assert_eq!(back.len(), 1);
    }
}
