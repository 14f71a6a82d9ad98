//! # QMesh Core
//!
//! Core types, wire format, transport abstraction and errors for the qmesh
//! adaptive router.
//!
//! This crate provides the foundational pieces shared by the routing engine,
//! the UDP node and the in-process simulation, so the same dispatch logic
//! runs unchanged over real sockets and over in-memory channels.
//!
//! ## Key Traits
//!
//! - [`Transport`]: Datagram send/receive keyed by node [`Address`]
//!
//! ## Key Types
//!
//! - [`Address`]: Opaque node identifier (an IP address)
//! - [`NeighborSet`]: Ordered, duplicate-free set of adjacent nodes
//! - [`Packet`]: `DATA` / `FEEDBACK` wire messages (JSON)
//! - [`RoutingDecision`]: Outcome of routing a data packet
//! - [`RouterEvent`]: Observable outcome of handling one packet
//! - [`CostSnapshot`]: Persisted form of a learned cost table
//! - [`MockNetwork`]: In-memory datagram network for tests

pub mod address;
pub mod error;
pub mod event;
pub mod mock_transport;
pub mod packet;
pub mod routing;
pub mod snapshot;
pub mod topology;
pub mod transport;

// Re-export main types
pub use address::*;
pub use error::*;
pub use event::*;
pub use mock_transport::*;
pub use packet::*;
pub use routing::*;
pub use snapshot::*;
pub use topology::*;
pub use transport::*;
