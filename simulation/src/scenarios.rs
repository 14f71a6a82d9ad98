//! Pre-defined simulation scenarios for qmesh
//!
//! The convergence scenario is the end-to-end check of the learning rule:
//! the top-left router repeatedly sends to the bottom-right one while every
//! router explores, then exploration is switched off and the greedy path is
//! measured.

use serde::{Deserialize, Serialize};
use tracing::info;

use qmesh_routing::RouterConfig;

use crate::simulation::{GridSimulation, PacketOutcome, SimConfig, SimError, SimStats};
use crate::topology::GridTopology;

/// Parameters of a convergence run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Grid dimension
    pub size: u16,
    /// Packets sent with exploration on
    pub train: usize,
    /// Packets sent with exploration off
    pub eval: usize,
    /// Simulation seed
    pub seed: u64,
    /// Datagram loss probability
    pub loss: f64,
    /// Router settings used while training
    pub router: RouterConfig,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            size: 3,
            train: 1000,
            eval: 20,
            seed: 0,
            loss: 0.0,
            router: RouterConfig::default().with_hop_limit(64),
        }
    }
}

/// Result of a convergence run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub size: u16,
    /// Fewest forwards from corner to corner
    pub optimal_hops: u32,
    /// Statistics after training
    pub training: SimStats,
    /// Mean forwards of delivered packets in the first tenth of training
    pub early_mean_hops: Option<f64>,
    /// Mean forwards of delivered packets in the last tenth of training
    pub late_mean_hops: Option<f64>,
    /// Outcome of every evaluation packet
    pub evaluation: Vec<PacketOutcome>,
}

impl ConvergenceReport {
    /// Whether every evaluation packet was delivered along a shortest path
    pub fn converged(&self) -> bool {
        !self.evaluation.is_empty()
            && self
                .evaluation
                .iter()
                .all(|o| o.is_delivered() && o.hops() == self.optimal_hops)
    }

    /// Whether every evaluation packet was delivered with the same number of
    /// forwards
    pub fn stable(&self) -> bool {
        self.evaluation.iter().all(PacketOutcome::is_delivered)
            && self.evaluation.windows(2).all(|w| w[0].hops() == w[1].hops())
    }

    /// Human-readable summary
    pub fn summary(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Convergence on a {0}x{0} grid\n", self.size));
        output.push_str(&format!("  Optimal hops: {}\n", self.optimal_hops));
        output.push_str(&format!(
            "  Training: {} injected, {} delivered, {} dropped, {} lost\n",
            self.training.packets_injected,
            self.training.packets_delivered,
            self.training.packets_dropped,
            self.training.packets_lost,
        ));
        if let (Some(early), Some(late)) = (self.early_mean_hops, self.late_mean_hops) {
            output.push_str(&format!("  Mean hops: {early:.2} early, {late:.2} late\n"));
        }
        let hops: Vec<String> = self
            .evaluation
            .iter()
            .map(|o| match o {
                PacketOutcome::Delivered { hops, .. } => hops.to_string(),
                PacketOutcome::Dropped { .. } => "dropped".to_string(),
                PacketOutcome::Lost { .. } => "lost".to_string(),
            })
            .collect();
        output.push_str(&format!("  Evaluation hops: [{}]\n", hops.join(", ")));
        if let Some(path) = self.evaluation.iter().rev().find_map(PacketOutcome::path) {
            let path: Vec<String> = path.iter().map(ToString::to_string).collect();
            output.push_str(&format!("  Greedy path: {}\n", path.join(" -> ")));
        }
        output.push_str(&format!(
            "  Converged: {}\n",
            if self.converged() { "yes" } else { "no" }
        ));
        output
    }
}

fn mean_hops(outcomes: &[PacketOutcome]) -> Option<f64> {
    let delivered: Vec<u32> = outcomes
        .iter()
        .filter(|o| o.is_delivered())
        .map(PacketOutcome::hops)
        .collect();
    (!delivered.is_empty())
        .then(|| f64::from(delivered.iter().sum::<u32>()) / delivered.len() as f64)
}

/// Train corner-to-corner traffic, then measure the greedy path
pub fn run_convergence_scenario(config: &ConvergenceConfig) -> Result<ConvergenceReport, SimError> {
    info!(
        size = config.size,
        train = config.train,
        eval = config.eval,
        seed = config.seed,
        "=== Running convergence scenario ==="
    );

    let topology = GridTopology::new(config.size)?;
    let last = config.size - 1;
    let source = topology.address_of(0, 0)?;
    let destination = topology.address_of(last, last)?;
    let optimal_hops = topology.shortest_hops(&source, &destination)?;

    let mut sim = GridSimulation::new(
        topology,
        SimConfig {
            router: config.router.clone(),
            loss: config.loss,
            seed: config.seed,
            ..Default::default()
        },
    )?;

    let mut training = Vec::with_capacity(config.train);
    for _ in 0..config.train {
        training.push(sim.send(source, destination)?);
    }
    let tenth = (config.train / 10).max(1).min(training.len());
    let early_mean_hops = mean_hops(&training[..tenth]);
    let late_mean_hops = mean_hops(&training[training.len() - tenth..]);
    let training_stats = sim.stats.clone();

    info!(
        delivered = training_stats.packets_delivered,
        early = ?early_mean_hops,
        late = ?late_mean_hops,
        "Training complete"
    );

    sim.set_epsilon(0.0)?;
    let mut evaluation = Vec::with_capacity(config.eval);
    for _ in 0..config.eval {
        evaluation.push(sim.send(source, destination)?);
    }

    let report = ConvergenceReport {
        size: config.size,
        optimal_hops,
        training: training_stats,
        early_mean_hops,
        late_mean_hops,
        evaluation,
    };
    info!(converged = report.converged(), "Convergence scenario complete");
    Ok(report)
}
