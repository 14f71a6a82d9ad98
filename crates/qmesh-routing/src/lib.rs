//! # QMesh Routing
//!
//! Q-routing engine for qmesh.
//!
//! Every node keeps its own estimate of how expensive it is to reach each
//! destination through each neighbor, and improves those estimates from the
//! feedback its neighbors send back hop by hop. No node ever sees the global
//! topology.
//!
//! ## Core Components
//!
//! - [`GridAddressing`] / [`neighbors_of`]: Derive a node's neighbors from its grid address
//! - [`CostTable`]: Destination → neighbor → learned cost, with consistent snapshots
//! - [`ForwardingPolicy`]: Epsilon-greedy next-hop selection
//! - [`LearningUpdater`]: Bellman-style feedback update
//! - [`QRouter`]: Turns one inbound packet into outbound packets and an event
//!
//! ## Learning Rule
//!
//! ```text
//! Q(d, n) ← Q(d, n) + α·((1 + γ·estimate_n(d)) − Q(d, n))      α = 0.5, γ = 0.9
//! ```
//!
//! Every entry starts at 5.0, above any true cost on a small grid. With a 10%
//! exploration rate, estimates along the shortest paths converge and greedy
//! decisions settle on them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qmesh_core::{Address, DataPacket, Packet};
//! use qmesh_routing::{neighbors_of, QRouter, RouterConfig};
//!
//! let own = Address::v4(10, 0, 1, 1);
//! let router = QRouter::new(own, neighbors_of(&own, 3)?, &RouterConfig::default())?;
//!
//! let dispatch = router.process(sender, Packet::Data(DataPacket::new(dest, "hi")));
//! for out in dispatch.outbound {
//!     transport.send(&out.to, out.packet.encode()?).await?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod learning;
pub mod policy;
pub mod router;
pub mod table;

pub use config::RouterConfig;
pub use error::{RoutingError, RoutingResult};
pub use grid::{GridAddressing, GridCoord, neighbors_of};
pub use learning::{LearningParams, LearningUpdater};
pub use policy::{DEFAULT_EPSILON, ForwardingPolicy, NextHop};
pub use router::{Dispatch, Outbound, QRouter};
pub use table::{CostTable, CostUpdate, DEFAULT_INITIAL_COST};
