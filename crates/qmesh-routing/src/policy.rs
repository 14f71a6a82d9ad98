//! Epsilon-greedy next-hop selection

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::trace;

use qmesh_core::Address;

use crate::error::{RoutingError, RoutingResult};
use crate::table::CostTable;

/// Default exploration rate
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Chosen neighbor for a forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub address: Address,
    /// Picked at random rather than by lowest cost
    pub explored: bool,
}

/// Epsilon-greedy forwarding policy
///
/// With probability ε a uniformly random candidate is chosen; otherwise the
/// candidate with the lowest learned cost, ties going to the earliest
/// neighbor in set order.
pub struct ForwardingPolicy {
    /// Exploration rate as f64 bits
    epsilon: AtomicU64,
    rng: Mutex<StdRng>,
}

impl ForwardingPolicy {
    /// Create a policy; a seed makes exploration reproducible
    pub fn new(epsilon: f64, seed: Option<u64>) -> RoutingResult<Self> {
        validate_epsilon(epsilon)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            epsilon: AtomicU64::new(epsilon.to_bits()),
            rng: Mutex::new(rng),
        })
    }

    pub fn epsilon(&self) -> f64 {
        f64::from_bits(self.epsilon.load(Ordering::Relaxed))
    }

    /// Change the exploration rate at runtime
    pub fn set_epsilon(&self, epsilon: f64) -> RoutingResult<()> {
        validate_epsilon(epsilon)?;
        self.epsilon.store(epsilon.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Pick the neighbor to forward a packet for `destination` to.
    ///
    /// `excluded` (the hop the packet arrived from) is never returned.
    /// Initializes the destination row as a side effect. Returns `None` when
    /// no candidate remains.
    pub fn decide_next_hop(
        &self,
        table: &CostTable,
        destination: &Address,
        excluded: Option<&Address>,
    ) -> Option<NextHop> {
        table.ensure(destination);

        let candidates = table.neighbors().excluding(excluded);
        if candidates.is_empty() {
            return None;
        }

        let explore = {
            let epsilon = self.epsilon();
            let mut rng = self.rng.lock();
            if epsilon > 0.0 && rng.random::<f64>() < epsilon {
                candidates.choose(&mut *rng).copied()
            } else {
                None
            }
        };
        if let Some(address) = explore {
            trace!(destination = %destination, next_hop = %address, "exploring");
            return Some(NextHop {
                address,
                explored: true,
            });
        }

        let mut best: Option<(Address, f64)> = None;
        for candidate in candidates {
            let cost = table.get(destination, &candidate);
            // Strict comparison keeps the first of equal minima
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((candidate, cost));
            }
        }
        best.map(|(address, _)| NextHop {
            address,
            explored: false,
        })
    }
}

impl std::fmt::Debug for ForwardingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingPolicy")
            .field("epsilon", &self.epsilon())
            .finish_non_exhaustive()
    }
}

fn validate_epsilon(epsilon: f64) -> RoutingResult<()> {
    if (0.0..=1.0).contains(&epsilon) {
        Ok(())
    } else {
        Err(RoutingError::InvalidEpsilon(epsilon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DEFAULT_INITIAL_COST;

    fn addr(c: u8, d: u8) -> Address {
        Address::v4(10, 0, c, d)
    }

    fn interior_table() -> CostTable {
        CostTable::new(
            vec![addr(1, 2), addr(3, 2), addr(2, 1), addr(2, 3)].into(),
            DEFAULT_INITIAL_COST,
        )
    }

    #[test]
    fn test_greedy_picks_minimum() {
        let table = interior_table();
        let dest = addr(3, 3);
        table.set(&dest, &addr(2, 3), 1.9);
        table.set(&dest, &addr(3, 2), 2.2);

        let policy = ForwardingPolicy::new(0.0, Some(7)).unwrap();
        let hop = policy.decide_next_hop(&table, &dest, None).unwrap();
        assert_eq!(hop.address, addr(2, 3));
        assert!(!hop.explored);
    }

    #[test]
    fn test_ties_go_to_first_neighbor() {
        let table = interior_table();
        let policy = ForwardingPolicy::new(0.0, None).unwrap();
        for _ in 0..10 {
            let hop = policy.decide_next_hop(&table, &addr(3, 3), None).unwrap();
            assert_eq!(hop.address, addr(1, 2));
        }
        let hop = policy
            .decide_next_hop(&table, &addr(3, 3), Some(&addr(1, 2)))
            .unwrap();
        assert_eq!(hop.address, addr(3, 2));
    }

    #[test]
    fn test_excluded_neighbor_is_never_returned() {
        let table = interior_table();
        let dest = addr(3, 3);
        table.set(&dest, &addr(2, 1), 0.0);

        for epsilon in [0.0, 0.5, 1.0] {
            let policy = ForwardingPolicy::new(epsilon, Some(42)).unwrap();
            for _ in 0..200 {
                let hop = policy.decide_next_hop(&table, &dest, Some(&addr(2, 1))).unwrap();
                assert_ne!(hop.address, addr(2, 1));
            }
        }
    }

    #[test]
    fn test_only_neighbor_excluded_yields_none() {
        let table = CostTable::new(vec![addr(1, 2)].into(), DEFAULT_INITIAL_COST);
        let policy = ForwardingPolicy::new(1.0, Some(1)).unwrap();
        assert!(policy.decide_next_hop(&table, &addr(3, 3), Some(&addr(1, 2))).is_none());
        // The destination is still initialized
        assert!(table.contains(&addr(3, 3)));
    }

    #[test]
    fn test_full_exploration_covers_all_candidates() {
        let table = interior_table();
        let policy = ForwardingPolicy::new(1.0, Some(3)).unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let hop = policy.decide_next_hop(&table, &addr(3, 3), Some(&addr(1, 2))).unwrap();
            assert!(hop.explored);
            seen.insert(hop.address);
        }
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&addr(1, 2)));
    }

    #[test]
    fn test_seeded_policies_agree() {
        let table = interior_table();
        let a = ForwardingPolicy::new(0.5, Some(99)).unwrap();
        let b = ForwardingPolicy::new(0.5, Some(99)).unwrap();
        for _ in 0..100 {
            assert_eq!(
                a.decide_next_hop(&table, &addr(3, 3), None),
                b.decide_next_hop(&table, &addr(3, 3), None)
            );
        }
    }

    #[test]
    fn test_epsilon_validation() {
        assert!(ForwardingPolicy::new(-0.1, None).is_err());
        assert!(ForwardingPolicy::new(f64::NAN, None).is_err());
        let policy = ForwardingPolicy::new(0.1, None).unwrap();
        assert!(policy.set_epsilon(1.5).is_err());
        policy.set_epsilon(0.0).unwrap();
        assert_eq!(policy.epsilon(), 0.0);
    }
}
