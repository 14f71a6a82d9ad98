//! Routing types and decisions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Possible outcomes of routing a data packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RoutingDecision {
    /// The packet is addressed to this node
    Deliver,

    /// Pass the packet one hop further
    Forward {
        /// Neighbor the packet goes to
        next_hop: Address,
        /// Whether the neighbor was an exploration pick rather than the
        /// current best
        explored: bool,
    },

    /// Drop the packet
    Drop {
        /// Why the packet was dropped
        reason: DropReason,
    },
}

impl RoutingDecision {
    /// Create a forward decision
    pub fn forward(next_hop: Address, explored: bool) -> Self {
        Self::Forward { next_hop, explored }
    }

    /// Create a drop decision
    pub fn drop(reason: DropReason) -> Self {
        Self::Drop { reason }
    }

    /// The chosen next hop, if forwarding
    pub fn next_hop(&self) -> Option<Address> {
        match self {
            Self::Forward { next_hop, .. } => Some(*next_hop),
            _ => None,
        }
    }
}

/// Reasons a data packet might be dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Every neighbor was excluded (or there are none)
    NoRoute,
    /// The packet was forwarded as often as the hop limit allows
    HopLimitExceeded,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRoute => write!(f, "no route"),
            Self::HopLimitExceeded => write!(f, "hop limit exceeded"),
        }
    }
}
