//! Simulation engine for qmesh
//!
//! Runs one [`QRouter`] per grid cell in a single thread. Datagrams travel
//! through one FIFO queue as encoded bytes, so every hop goes through the
//! same wire format and dispatch as a deployed router. Each router's
//! exploration is seeded from the simulation seed, which makes a run fully
//! reproducible.
//!
//! Packets are injected one at a time; [`GridSimulation::inject`] runs the
//! network until it is idle again (the packet and all feedback it caused have
//! been handled) and reports what happened to the packet.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use qmesh_core::{Address, DataPacket, DropReason, Packet, ProtocolError, RouterEvent};
use qmesh_routing::{QRouter, RouterConfig, RoutingError};

use crate::topology::GridTopology;

/// Origin of injected packets; never a neighbor of any router, so feedback
/// sent to it leaves the grid
pub const INJECTOR: Address = Address::v4(127, 0, 0, 1);

/// Errors raised by the simulation
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0} is not part of the grid")]
    UnknownNode(Address),

    #[error("Loss probability must be within [0, 1], got {0}")]
    InvalidLoss(f64),

    /// The network was still busy after the datagram budget ran out
    #[error("Network still busy after {0} datagrams")]
    Stalled(usize),

    /// The queue drained without the packet being delivered, dropped or lost
    #[error("Packet {0:?} vanished")]
    Unresolved(String),
}

/// Configuration for the simulation
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Settings applied to every router; the seed is derived per router
    pub router: RouterConfig,
    /// Probability that a datagram sent by a router is lost
    pub loss: f64,
    /// Seed for exploration and loss
    pub seed: u64,
    /// Datagrams one injection may cause before the run is abandoned
    pub max_datagrams: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default().with_hop_limit(64),
            loss: 0.0,
            seed: 0,
            max_datagrams: 100_000,
        }
    }
}

/// Simulation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub packets_injected: u64,
    pub packets_delivered: u64,
    pub packets_dropped: u64,
    pub packets_lost: u64,
    pub forwards: u64,
    pub explored_forwards: u64,
    pub feedback_sent: u64,
    pub feedback_applied: u64,
    pub feedback_ignored: u64,
    pub datagrams_lost: u64,
    /// Forwards taken by delivered packets
    pub total_delivery_hops: u64,
}

impl SimStats {
    /// Mean forwards per delivered packet
    pub fn mean_delivery_hops(&self) -> Option<f64> {
        (self.packets_delivered > 0)
            .then(|| self.total_delivery_hops as f64 / self.packets_delivered as f64)
    }
}

/// What happened to one injected packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PacketOutcome {
    /// Reached its destination; `path` starts at the source router
    Delivered { hops: u32, path: Vec<Address> },
    /// Discarded by the router at `at`
    Dropped {
        hops: u32,
        at: Address,
        reason: DropReason,
    },
    /// A forward carrying it was lost in transit
    Lost { hops: u32 },
}

impl PacketOutcome {
    /// Forwards the packet made
    pub fn hops(&self) -> u32 {
        match self {
            PacketOutcome::Delivered { hops, .. }
            | PacketOutcome::Dropped { hops, .. }
            | PacketOutcome::Lost { hops } => *hops,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, PacketOutcome::Delivered { .. })
    }

    /// Routers visited, for delivered packets
    pub fn path(&self) -> Option<&[Address]> {
        match self {
            PacketOutcome::Delivered { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    from: Address,
    to: Address,
    data: Vec<u8>,
}

/// Progress of the packet currently being traced
struct Trace {
    payload: String,
    path: Vec<Address>,
    outcome: Option<PacketOutcome>,
}

impl Trace {
    fn hops(&self) -> u32 {
        u32::try_from(self.path.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }
}

/// The simulation state
pub struct GridSimulation {
    topology: GridTopology,
    routers: BTreeMap<Address, QRouter>,
    queue: VecDeque<InFlight>,
    rng: StdRng,
    loss: f64,
    max_datagrams: usize,
    next_packet: u64,
    /// Statistics
    pub stats: SimStats,
}

impl GridSimulation {
    /// Create a simulation with one router per grid cell
    pub fn new(topology: GridTopology, config: SimConfig) -> Result<Self, SimError> {
        if !(0.0..=1.0).contains(&config.loss) {
            return Err(SimError::InvalidLoss(config.loss));
        }

        let mut routers = BTreeMap::new();
        for (index, address) in topology.addresses().iter().enumerate() {
            let neighbors = topology
                .neighbors(address)
                .cloned()
                .ok_or(SimError::UnknownNode(*address))?;
            let router_config = config
                .router
                .clone()
                .with_seed(config.seed.wrapping_add(index as u64 + 1));
            routers.insert(*address, QRouter::new(*address, neighbors, &router_config)?);
        }

        debug!(routers = routers.len(), seed = config.seed, "Simulation created");

        Ok(Self {
            topology,
            routers,
            queue: VecDeque::new(),
            rng: StdRng::seed_from_u64(config.seed),
            loss: config.loss,
            max_datagrams: config.max_datagrams,
            next_packet: 0,
            stats: SimStats::default(),
        })
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    pub fn router(&self, address: &Address) -> Option<&QRouter> {
        self.routers.get(address)
    }

    pub fn routers(&self) -> impl Iterator<Item = &QRouter> {
        self.routers.values()
    }

    /// Change every router's exploration rate
    pub fn set_epsilon(&self, epsilon: f64) -> Result<(), SimError> {
        for router in self.routers.values() {
            router.policy().set_epsilon(epsilon)?;
        }
        Ok(())
    }

    /// Inject a packet with a generated payload
    pub fn send(&mut self, source: Address, destination: Address) -> Result<PacketOutcome, SimError> {
        self.next_packet += 1;
        let payload = format!("sim-{}", self.next_packet);
        self.inject(source, destination, payload)
    }

    /// Hand a DATA packet to `source` and run until the network is idle
    pub fn inject(
        &mut self,
        source: Address,
        destination: Address,
        payload: impl Into<String>,
    ) -> Result<PacketOutcome, SimError> {
        if !self.topology.contains(&source) {
            return Err(SimError::UnknownNode(source));
        }
        let payload = payload.into();
        let data = Packet::from(DataPacket::new(destination, payload.clone())).encode()?;
        self.queue.push_back(InFlight {
            from: INJECTOR,
            to: source,
            data,
        });
        self.stats.packets_injected += 1;

        let mut trace = Trace {
            payload,
            path: vec![source],
            outcome: None,
        };
        self.run_until_idle(&mut trace)?;

        trace
            .outcome
            .ok_or(SimError::Unresolved(trace.payload))
    }

    fn run_until_idle(&mut self, trace: &mut Trace) -> Result<(), SimError> {
        let mut processed = 0usize;
        while let Some(datagram) = self.queue.pop_front() {
            processed += 1;
            if processed > self.max_datagrams {
                self.queue.clear();
                return Err(SimError::Stalled(self.max_datagrams));
            }

            let Some(router) = self.routers.get(&datagram.to) else {
                trace!(to = %datagram.to, "Datagram for unknown address discarded");
                continue;
            };
            let packet = match Packet::decode(&datagram.data) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(error = %e, "Undecodable datagram in simulation");
                    continue;
                }
            };
            let at = router.address();
            let dispatch = router.process(datagram.from, packet);

            self.record(&dispatch.event, at, trace);

            for outbound in dispatch.outbound {
                let ours = matches!(&outbound.packet, Packet::Data(d) if d.payload == trace.payload);
                if matches!(outbound.packet, Packet::Feedback(_)) {
                    self.stats.feedback_sent += 1;
                }
                if self.loss > 0.0 && self.rng.random::<f64>() < self.loss {
                    self.stats.datagrams_lost += 1;
                    if ours {
                        self.stats.packets_lost += 1;
                        trace.outcome = Some(PacketOutcome::Lost { hops: trace.hops() });
                    }
                    continue;
                }
                self.queue.push_back(InFlight {
                    from: at,
                    to: outbound.to,
                    data: outbound.packet.encode()?,
                });
            }
        }
        Ok(())
    }

    fn record(&mut self, event: &RouterEvent, at: Address, trace: &mut Trace) {
        let ours = event.data().is_some_and(|d| d.payload == trace.payload);
        match event {
            RouterEvent::Forwarded {
                next_hop, explored, ..
            } => {
                self.stats.forwards += 1;
                if *explored {
                    self.stats.explored_forwards += 1;
                }
                if ours {
                    trace.path.push(*next_hop);
                }
            }
            RouterEvent::Delivered { .. } => {
                self.stats.packets_delivered += 1;
                if ours {
                    let hops = trace.hops();
                    self.stats.total_delivery_hops += u64::from(hops);
                    trace.outcome = Some(PacketOutcome::Delivered {
                        hops,
                        path: trace.path.clone(),
                    });
                }
            }
            RouterEvent::Dropped { reason, .. } => {
                self.stats.packets_dropped += 1;
                if ours {
                    trace.outcome = Some(PacketOutcome::Dropped {
                        hops: trace.hops(),
                        at,
                        reason: *reason,
                    });
                }
            }
            RouterEvent::FeedbackApplied { .. } => self.stats.feedback_applied += 1,
            RouterEvent::FeedbackIgnored { .. } => self.stats.feedback_ignored += 1,
        }
    }
}
