//! qmesh simulation runner
//!
//! # Usage
//!
//! ```bash
//! # Train on a 3x3 grid and check the greedy path
//! qmesh-sim converge
//!
//! # Bigger grid, lossy links, JSON report
//! qmesh-sim converge --size 5 --train 5000 --loss 0.05 --json
//!
//! # Show a grid's adjacency
//! qmesh-sim topology --size 4
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use qmesh_logging::QMeshSubscriberBuilder;
use qmesh_simulation::{ConvergenceConfig, GridTopology, run_convergence_scenario};

#[derive(Parser)]
#[command(
    name = "qmesh-sim",
    about = "Deterministic Q-routing grid simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train corner-to-corner traffic, then measure the greedy path
    Converge {
        /// Grid dimension
        #[arg(short, long, default_value = "3")]
        size: u16,

        /// Packets sent while exploring
        #[arg(long, default_value = "1000")]
        train: usize,

        /// Packets sent greedily afterwards
        #[arg(long, default_value = "20")]
        eval: usize,

        /// Simulation seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Datagram loss probability
        #[arg(long, default_value = "0.0")]
        loss: f64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a grid topology
    Topology {
        /// Grid dimension
        #[arg(short, long, default_value = "3")]
        size: u16,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let _guard = QMeshSubscriberBuilder::new()
        .with_pretty(true)
        .with_level(if cli.verbose { "debug" } else { "warn" })
        .init()?;

    match cli.command {
        Commands::Converge {
            size,
            train,
            eval,
            seed,
            loss,
            json,
        } => {
            let config = ConvergenceConfig {
                size,
                train,
                eval,
                seed,
                loss,
                ..Default::default()
            };
            let report = run_convergence_scenario(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.summary());
            }
            if !report.converged() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Topology { size } => {
            let topology = GridTopology::new(size)?;
            print!("{}", topology.visualize());
        }
    }

    Ok(ExitCode::SUCCESS)
}
