//! Node configuration

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use qmesh_core::{Address, NeighborSet};
use qmesh_routing::{GridAddressing, RouterConfig};
use qmesh_storage::validate_node_key;

use crate::error::{NodeError, NodeResult};

/// Default UDP port routers listen and send on
pub const DEFAULT_PORT: u16 = 8888;

/// How a node finds its neighbors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TopologyConfig {
    /// Square grid; neighbors derived from the node's own address
    Grid {
        size: u16,
        #[serde(default)]
        addressing: GridAddressing,
    },
    /// Fixed neighbor list
    Explicit { neighbors: Vec<Address> },
}

impl Default for TopologyConfig {
    fn default() -> Self {
        TopologyConfig::Grid {
            size: 3,
            addressing: GridAddressing::default(),
        }
    }
}

impl TopologyConfig {
    /// Neighbor set of `own` under this topology
    pub fn neighbors(&self, own: &Address) -> NodeResult<NeighborSet> {
        match self {
            TopologyConfig::Grid { size, addressing } => Ok(addressing.neighbors_of(own, *size)?),
            TopologyConfig::Explicit { neighbors } => {
                Ok(NeighborSet::for_node(own, neighbors.iter().copied()))
            }
        }
    }
}

/// Datagram transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Local socket to bind
    pub bind: SocketAddr,
    /// Port packets are sent to on every peer
    pub peer_port: u16,
    /// Per-peer socket overrides, for running several routers on one host
    pub peers: BTreeMap<Address, SocketAddr>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            peer_port: DEFAULT_PORT,
            peers: BTreeMap::new(),
        }
    }
}

/// Snapshot persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding `q_table_<name>.json`
    pub state_dir: PathBuf,
    /// Quiet period before a dirty table is written, in milliseconds
    pub save_debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("logs"),
            save_debounce_ms: 0,
        }
    }
}

impl PersistenceConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

/// Configuration for a router node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name, keys the snapshot file; defaults to the address
    pub name: Option<String>,

    /// The node's own address
    pub address: Option<Address>,

    /// Neighbor discovery
    pub topology: TopologyConfig,

    /// Learning and forwarding parameters
    pub router: RouterConfig,

    /// Socket settings
    pub transport: TransportConfig,

    /// Snapshot settings
    pub persistence: PersistenceConfig,

    /// Number of packet-handling workers
    pub workers: usize,

    /// Datagrams buffered between the receiver and the workers
    pub queue_capacity: usize,

    /// Capacity of the router event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: None,
            address: None,
            topology: TopologyConfig::default(),
            router: RouterConfig::default(),
            transport: TransportConfig::default(),
            persistence: PersistenceConfig::default(),
            workers: 4,
            queue_capacity: 1024,
            event_channel_capacity: 1024,
        }
    }
}

impl NodeConfig {
    /// Create a config for the node at `address`
    pub fn new(address: Address) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> NodeResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> NodeResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Use a `size`x`size` grid, keeping any addressing already configured
    pub fn with_grid(mut self, size: u16) -> Self {
        let addressing = match &self.topology {
            TopologyConfig::Grid { addressing, .. } => *addressing,
            TopologyConfig::Explicit { .. } => GridAddressing::default(),
        };
        self.topology = TopologyConfig::Grid { size, addressing };
        self
    }

    pub fn with_neighbors(mut self, neighbors: impl IntoIterator<Item = Address>) -> Self {
        self.topology = TopologyConfig::Explicit {
            neighbors: neighbors.into_iter().collect(),
        };
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.router.epsilon = epsilon;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.router.seed = Some(seed);
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u32) -> Self {
        self.router.hop_limit = Some(hop_limit);
        self
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.transport.bind = bind;
        self
    }

    pub fn with_peer_port(mut self, port: u16) -> Self {
        self.transport.peer_port = port;
        self
    }

    /// Send to `peer` at `socket` instead of `peer:peer_port`
    pub fn with_peer(mut self, peer: Address, socket: SocketAddr) -> Self {
        self.transport.peers.insert(peer, socket);
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistence.state_dir = dir.into();
        self
    }

    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.persistence.save_debounce_ms = debounce.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// The configured address
    pub fn address(&self) -> NodeResult<Address> {
        self.address
            .ok_or_else(|| NodeError::Config("node address is required".into()))
    }

    /// The configured name, or the address when none is set
    pub fn node_name(&self) -> NodeResult<String> {
        match &self.name {
            Some(name) => Ok(name.clone()),
            None => Ok(self.address()?.to_string()),
        }
    }

    /// The node's neighbor set
    pub fn neighbors(&self) -> NodeResult<NeighborSet> {
        self.topology.neighbors(&self.address()?)
    }

    /// Check the configuration for values the node cannot run with
    pub fn validate(&self) -> NodeResult<()> {
        self.address()?;
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(NodeError::Config("node name must not be empty".into()));
        }
        validate_node_key(&self.node_name()?)
            .map_err(|e| NodeError::Config(format!("node name cannot key a snapshot: {e}")))?;
        if self.workers == 0 {
            return Err(NodeError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(NodeError::Config("queue_capacity must be at least 1".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(NodeError::Config(
                "event_channel_capacity must be at least 1".into(),
            ));
        }
        self.router.validate()?;
        self.neighbors()?;
        Ok(())
    }
}
