//! # QMesh Simulation
//!
//! A deterministic, single-threaded simulation of a grid of Q-routing
//! routers.
//!
//! ## Overview
//!
//! Every grid cell runs the same [`QRouter`](qmesh_routing::QRouter) a
//! deployed node runs. Instead of sockets, datagrams move through one FIFO
//! queue, and every router's exploration is seeded, so the same seed always
//! produces the same run.
//!
//! - **Topology** (`topology.rs`): NxN grids with address-derived adjacency
//! - **Simulation** (`simulation.rs`): Injection, datagram queue, loss, outcome tracing
//! - **Scenarios** (`scenarios.rs`): The corner-to-corner convergence run
//!
//! ## Example
//!
//! ```rust,ignore
//! use qmesh_simulation::*;
//!
//! let report = run_convergence_scenario(&ConvergenceConfig::default())?;
//! println!("{}", report.summary());
//! assert!(report.converged());
//! ```

pub mod scenarios;
pub mod simulation;
pub mod topology;

pub use scenarios::{ConvergenceConfig, ConvergenceReport, run_convergence_scenario};
pub use simulation::{GridSimulation, INJECTOR, PacketOutcome, SimConfig, SimError, SimStats};
pub use topology::GridTopology;
