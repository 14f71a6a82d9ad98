//! Q-routing router
//!
//! The [`QRouter`] binds a node's cost table, forwarding policy and learning
//! updater, and turns one inbound packet into the packets to send and the
//! event to report. It performs no I/O, so the same dispatch runs inside the
//! UDP node and inside the deterministic simulation.
//!
//! ## Dispatch
//!
//! - **FEEDBACK** from a neighbor updates `(for_dest, sender)`
//! - **DATA** for this node is delivered; a zero estimate goes back to the
//!   sender
//! - **DATA** for another node goes to the policy's next hop (never the
//!   sender); this node's best estimate goes back to the sender
//! - **DATA** with no candidate hop is dropped without feedback
//!
//! Feedback always goes back to the transport sender, neighbor or not.
//! Only feedback from a neighbor is learned from: an entry keyed by any other
//! node is never consulted, and a router listening on loopback hears its own
//! replies to the injector.

use tracing::{debug, info};

use qmesh_core::{
    Address, CostSnapshot, DataPacket, DropReason, FeedbackPacket, NeighborSet, Packet,
    RouterEvent, RoutingDecision,
};

use crate::config::RouterConfig;
use crate::error::RoutingResult;
use crate::learning::LearningUpdater;
use crate::policy::ForwardingPolicy;
use crate::table::{CostTable, CostUpdate};

/// A packet to send
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Address,
    pub packet: Packet,
}

/// Everything that follows from handling one packet
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Packets to send, in order
    pub outbound: Vec<Outbound>,
    /// What happened
    pub event: RouterEvent,
    /// Whether the cost table was mutated
    pub table_changed: bool,
}

/// Per-node Q-routing engine
#[derive(Debug)]
pub struct QRouter {
    address: Address,
    table: CostTable,
    policy: ForwardingPolicy,
    learner: LearningUpdater,
    hop_limit: Option<u32>,
}

impl QRouter {
    /// Create a router with an empty cost table
    pub fn new(address: Address, neighbors: NeighborSet, config: &RouterConfig) -> RoutingResult<Self> {
        Self::with_snapshot(address, neighbors, config, &CostSnapshot::new())
    }

    /// Create a router whose cost table is restored from `snapshot`
    pub fn with_snapshot(
        address: Address,
        neighbors: NeighborSet,
        config: &RouterConfig,
        snapshot: &CostSnapshot,
    ) -> RoutingResult<Self> {
        config.validate()?;
        let neighbors = NeighborSet::for_node(&address, neighbors.iter().copied());
        Ok(Self {
            address,
            table: CostTable::from_snapshot(neighbors, config.initial_cost, snapshot),
            policy: ForwardingPolicy::new(config.epsilon, config.seed)?,
            learner: LearningUpdater::new(config.learning)?,
            hop_limit: config.hop_limit,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn neighbors(&self) -> &NeighborSet {
        self.table.neighbors()
    }

    pub fn table(&self) -> &CostTable {
        &self.table
    }

    pub fn policy(&self) -> &ForwardingPolicy {
        &self.policy
    }

    pub fn hop_limit(&self) -> Option<u32> {
        self.hop_limit
    }

    /// Best current cost-to-go for `destination`
    pub fn best_estimate(&self, destination: &Address) -> f64 {
        if *destination == self.address {
            return 0.0;
        }
        self.table
            .best_cost(destination)
            .unwrap_or(self.table.initial_cost())
    }

    /// Decide what to do with a data packet that arrived from `from`
    pub fn route(&self, packet: &DataPacket, from: &Address) -> RoutingDecision {
        if packet.destination == self.address {
            return RoutingDecision::Deliver;
        }

        if let Some(limit) = self.hop_limit
            && packet.hops.unwrap_or(0) >= limit
        {
            return RoutingDecision::drop(DropReason::HopLimitExceeded);
        }

        match self
            .policy
            .decide_next_hop(&self.table, &packet.destination, Some(from))
        {
            Some(hop) => RoutingDecision::forward(hop.address, hop.explored),
            None => RoutingDecision::drop(DropReason::NoRoute),
        }
    }

    /// Fold a neighbor's estimate into the table
    ///
    /// Returns `None` (and changes nothing) if `from` is not a neighbor.
    pub fn apply_feedback(&self, from: &Address, feedback: &FeedbackPacket) -> Option<CostUpdate> {
        if !self.neighbors().contains(from) {
            return None;
        }
        Some(
            self.learner
                .update(&self.table, from, &feedback.for_dest, feedback.best_estimate),
        )
    }

    /// Handle one packet whose transport origin is `from`
    pub fn process(&self, from: Address, packet: Packet) -> Dispatch {
        let version = self.table.version();
        let (outbound, event) = match packet {
            Packet::Feedback(feedback) => self.process_feedback(from, feedback),
            Packet::Data(data) => self.process_data(from, data),
        };
        Dispatch {
            outbound,
            event,
            table_changed: self.table.version() != version,
        }
    }

    fn process_feedback(&self, from: Address, feedback: FeedbackPacket) -> (Vec<Outbound>, RouterEvent) {
        match self.apply_feedback(&from, &feedback) {
            Some(update) => {
                debug!(
                    from = %from,
                    destination = %feedback.for_dest,
                    estimate = feedback.best_estimate,
                    cost = update.current,
                    "Feedback applied"
                );
                let event = RouterEvent::feedback_applied(
                    from,
                    feedback.for_dest,
                    feedback.best_estimate,
                    update.previous,
                    update.current,
                );
                (Vec::new(), event)
            }
            None => {
                debug!(from = %from, destination = %feedback.for_dest, "Feedback from non-neighbor ignored");
                (Vec::new(), RouterEvent::feedback_ignored(from, feedback.for_dest))
            }
        }
    }

    fn process_data(&self, from: Address, data: DataPacket) -> (Vec<Outbound>, RouterEvent) {
        let mut outbound = Vec::with_capacity(2);

        match self.route(&data, &from) {
            RoutingDecision::Deliver => {
                info!(from = %from, payload = %data.payload, "Packet delivered");
                outbound.push(Self::feedback_to(from, data.destination, 0.0));
                (outbound, RouterEvent::delivered(data, from))
            }
            RoutingDecision::Forward { next_hop, explored } => {
                debug!(
                    destination = %data.destination,
                    from = %from,
                    next_hop = %next_hop,
                    explored,
                    "Forwarding packet"
                );
                let mut forwarded = data.clone();
                if self.hop_limit.is_some() {
                    forwarded.hops = Some(data.hops.unwrap_or(0) + 1);
                }
                outbound.push(Outbound {
                    to: next_hop,
                    packet: Packet::Data(forwarded),
                });
                let estimate = self.best_estimate(&data.destination);
                outbound.push(Self::feedback_to(from, data.destination, estimate));
                (outbound, RouterEvent::forwarded(data, from, next_hop, explored))
            }
            RoutingDecision::Drop { reason } => {
                info!(destination = %data.destination, from = %from, reason = %reason, "Packet dropped");
                (outbound, RouterEvent::dropped(data, from, reason))
            }
        }
    }

    fn feedback_to(to: Address, destination: Address, estimate: f64) -> Outbound {
        Outbound {
            to,
            packet: Packet::feedback(destination, estimate),
        }
    }
}
