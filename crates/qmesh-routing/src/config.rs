//! Router configuration

use serde::{Deserialize, Serialize};

use crate::error::{RoutingError, RoutingResult};
use crate::learning::LearningParams;
use crate::policy::DEFAULT_EPSILON;
use crate::table::DEFAULT_INITIAL_COST;

/// Tunables of one router's learning and forwarding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Cost assumed for entries never updated
    pub initial_cost: f64,
    /// Exploration rate
    pub epsilon: f64,
    /// RNG seed for reproducible exploration
    pub seed: Option<u64>,
    /// Feedback update parameters
    pub learning: LearningParams,
    /// Forwards allowed per packet; `None` forwards packets unmodified
    pub hop_limit: Option<u32>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            initial_cost: DEFAULT_INITIAL_COST,
            epsilon: DEFAULT_EPSILON,
            seed: None,
            learning: LearningParams::default(),
            hop_limit: None,
        }
    }
}

impl RouterConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_learning(mut self, learning: LearningParams) -> Self {
        self.learning = learning;
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u32) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    pub fn with_initial_cost(mut self, initial_cost: f64) -> Self {
        self.initial_cost = initial_cost;
        self
    }

    pub fn validate(&self) -> RoutingResult<()> {
        if !self.initial_cost.is_finite() {
            return Err(RoutingError::InvalidInitialCost(self.initial_cost));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(RoutingError::InvalidEpsilon(self.epsilon));
        }
        self.learning.validate()
    }
}
