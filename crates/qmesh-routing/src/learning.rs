//! Feedback learning
//!
//! A feedback packet from neighbor `n` carries n's best estimate of the cost
//! to reach destination `d`. The entry `(d, n)` is moved toward
//! `step_cost + γ·estimate` by a fraction α:
//!
//! ```text
//! new = current + α·((step_cost + γ·estimate) − current)
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use qmesh_core::Address;

use crate::error::{RoutingError, RoutingResult};
use crate::table::{CostTable, CostUpdate};

/// Update parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningParams {
    /// Learning rate
    pub alpha: f64,
    /// Discount applied to the downstream estimate
    pub gamma: f64,
    /// Cost of one hop
    pub step_cost: f64,
}

impl Default for LearningParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            gamma: 0.9,
            step_cost: 1.0,
        }
    }
}

impl LearningParams {
    pub fn validate(&self) -> RoutingResult<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(RoutingError::InvalidLearningParameter {
                name: "alpha",
                value: self.alpha,
            });
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RoutingError::InvalidLearningParameter {
                name: "gamma",
                value: self.gamma,
            });
        }
        if !self.step_cost.is_finite() {
            return Err(RoutingError::InvalidLearningParameter {
                name: "step_cost",
                value: self.step_cost,
            });
        }
        Ok(())
    }

    /// Value an entry converges to for a fixed downstream estimate
    pub fn target(&self, estimate: f64) -> f64 {
        self.step_cost + self.gamma * estimate
    }

    /// One learning step from `current`
    pub fn next_cost(&self, current: f64, estimate: f64) -> f64 {
        current + self.alpha * (self.target(estimate) - current)
    }
}

/// Applies feedback to a cost table
#[derive(Debug, Clone, Default)]
pub struct LearningUpdater {
    params: LearningParams,
}

impl LearningUpdater {
    pub fn new(params: LearningParams) -> RoutingResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    /// Fold `estimate`, reported by `source` for `destination`, into the table
    pub fn update(
        &self,
        table: &CostTable,
        source: &Address,
        destination: &Address,
        estimate: f64,
    ) -> CostUpdate {
        let update = table.update_with(destination, source, |current| {
            self.params.next_cost(current, estimate)
        });
        trace!(
            destination = %destination,
            via = %source,
            estimate,
            previous = update.previous,
            current = update.current,
            "cost updated"
        );
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DEFAULT_INITIAL_COST;

    fn addr(c: u8, d: u8) -> Address {
        Address::v4(10, 0, c, d)
    }

    fn make_table() -> CostTable {
        CostTable::new(vec![addr(2, 3), addr(3, 2)].into(), DEFAULT_INITIAL_COST)
    }

    #[test]
    fn test_single_update_from_sentinel() {
        let table = make_table();
        let updater = LearningUpdater::default();
        let update = updater.update(&table, &addr(2, 3), &addr(3, 3), 0.0);
        assert_eq!(update.previous, 5.0);
        assert_eq!(update.current, 3.0);
        assert_eq!(table.get(&addr(3, 3), &addr(2, 3)), 3.0);
        // Untouched neighbor keeps the initial cost
        assert_eq!(table.get(&addr(3, 3), &addr(3, 2)), 5.0);
    }

    #[test]
    fn test_repeated_zero_feedback_approaches_step_cost() {
        let table = make_table();
        let updater = LearningUpdater::default();
        let mut last = table.get(&addr(3, 3), &addr(2, 3));
        for _ in 0..30 {
            let update = updater.update(&table, &addr(2, 3), &addr(3, 3), 0.0);
            assert!(update.current < last);
            assert!(update.current > 1.0);
            last = update.current;
        }
        assert!((last - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_target_and_next_cost() {
        let params = LearningParams::default();
        assert!((params.target(1.9) - 2.71).abs() < 1e-12);
        assert_eq!(params.next_cost(5.0, 5.0), 5.25);
    }

    #[test]
    fn test_parameter_validation() {
        for params in [
            LearningParams { alpha: 0.0, ..Default::default() },
            LearningParams { alpha: 1.5, ..Default::default() },
            LearningParams { gamma: -0.1, ..Default::default() },
            LearningParams { step_cost: f64::INFINITY, ..Default::default() },
        ] {
            assert!(LearningUpdater::new(params).is_err(), "{params:?}");
        }
        assert!(LearningUpdater::new(LearningParams::default()).is_ok());
    }

    #[test]
    fn test_params_from_partial_json() {
        let params: LearningParams = serde_json::from_str(r#"{"alpha":0.25}"#).unwrap();
        assert_eq!(params.alpha, 0.25);
        assert_eq!(params.gamma, 0.9);
    }
}
