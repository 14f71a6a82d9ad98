//! Q-routing router daemon
//!
//! Runs one router on a UDP socket until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Node (0,0) of a 3x3 grid, snapshots under ./logs
//! qmesh-router h11 10.0.1.1
//!
//! # Settings from a file, with overrides
//! qmesh-router --config h22.toml --epsilon 0.05 --pretty
//!
//! # Explicit neighbors
//! qmesh-router r1 192.168.0.1 --neighbor 192.168.0.2 --neighbor 192.168.0.3
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use qmesh_core::Address;
use qmesh_logging::{FileConfig, LogConfig, QMeshSubscriberBuilder, RotationStrategy, WorkerGuard};
use qmesh_node::{NodeConfig, QMeshNode};

#[derive(Parser)]
#[command(name = "qmesh-router")]
#[command(about = "Adaptive Q-routing packet router")]
#[command(version)]
struct Args {
    /// Node name, keys the saved cost table
    name: Option<String>,

    /// This node's address
    address: Option<Address>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Derive neighbors from an NxN grid
    #[arg(long, conflicts_with = "neighbors")]
    grid_size: Option<u16>,

    /// Explicit neighbor (repeatable)
    #[arg(long = "neighbor")]
    neighbors: Vec<Address>,

    /// Local socket to bind
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Directory for the saved cost table
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Exploration rate
    #[arg(long)]
    epsilon: Option<f64>,

    /// Seed for exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Forwards allowed per packet
    #[arg(long)]
    hop_limit: Option<u32>,

    /// Packet-handling workers
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Use pretty console output instead of JSONL
    #[arg(short, long)]
    pretty: bool,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    /// File settings (or defaults) with command-line values applied on top
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)?,
            None => NodeConfig::default(),
        };

        if let Some(name) = &self.name {
            config = config.with_name(name.clone());
        }
        if let Some(address) = self.address {
            config = config.with_address(address);
        }
        if let Some(size) = self.grid_size {
            config = config.with_grid(size);
        }
        if !self.neighbors.is_empty() {
            config = config.with_neighbors(self.neighbors.iter().copied());
        }
        if let Some(bind) = self.bind {
            config = config.with_bind(bind);
        }
        if let Some(dir) = &self.state_dir {
            config = config.with_state_dir(dir.clone());
        }
        if let Some(epsilon) = self.epsilon {
            config = config.with_epsilon(epsilon);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(hop_limit) = self.hop_limit {
            config = config.with_hop_limit(hop_limit);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn init_logging(&self, node_name: &str) -> Result<Option<WorkerGuard>> {
        let config = if self.pretty {
            LogConfig::development()
        } else {
            LogConfig::default()
        };
        let mut builder = QMeshSubscriberBuilder::new()
            .with_config(config)
            .with_level(&self.log_level);
        if let Some(dir) = &self.log_dir {
            builder = builder.with_file_output(FileConfig {
                directory: dir.clone(),
                prefix: node_name.to_string(),
                rotation: RotationStrategy::Never,
                max_files: None,
            });
        }
        Ok(builder.init()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.node_config()?;
    let _guard = args.init_logging(&config.node_name()?)?;

    let node = QMeshNode::bind_udp(config)
        .await
        .context("failed to create router")?;
    node.start().await?;

    info!(
        node = %node.name(),
        address = %node.address(),
        neighbors = ?node.state().neighbors().as_slice(),
        "Router running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutting down");
    node.stop().await?;
    Ok(())
}
