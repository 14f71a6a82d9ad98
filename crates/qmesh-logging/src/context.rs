//! Node context for multi-instance logging
//!
//! Several routers can run in one process (tests, simulation). Every task a
//! node spawns runs inside the node's span, so each log line carries the
//! node name, its address and a per-run instance id.

use qmesh_core::Address;
use tracing::{Span, info_span};
use uuid::Uuid;

/// Identity of one running router, as it appears in logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    /// Configured node name
    pub name: String,
    /// The node's own address
    pub address: Address,
    /// Unique id of this run
    pub instance_id: Uuid,
}

impl NodeContext {
    /// Create a context with a fresh instance id
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self::with_instance_id(name, address, Uuid::new_v4())
    }

    /// Create a context with a specific instance id
    pub fn with_instance_id(name: impl Into<String>, address: Address, instance_id: Uuid) -> Self {
        Self {
            name: name.into(),
            address,
            instance_id,
        }
    }

    /// Span that scopes all of this node's activity
    pub fn span(&self) -> Span {
        info_span!(
            "node",
            node = %self.name,
            addr = %self.address,
            instance = %self.instance_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ids_differ() {
        let address = Address::v4(10, 0, 1, 1);
        let a = NodeContext::new("h11", address);
        let b = NodeContext::new("h11", address);
        assert_ne!(a.instance_id, b.instance_id);
        assert_eq!(a.name, "h11");
    }

    #[test]
    fn test_with_instance_id() {
        let id = Uuid::new_v4();
        let ctx = NodeContext::with_instance_id("h22", Address::v4(10, 0, 2, 2), id);
        assert_eq!(ctx.instance_id, id);
        // Without a subscriber the span is disabled but still usable
        let _entered = ctx.span().entered();
    }
}
