//! Routing error types

use thiserror::Error;

use qmesh_core::Address;

/// Errors raised while building or configuring a router
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Address cannot be decoded as a grid coordinate
    #[error("Address {address} is not on the grid: {detail}")]
    OffGrid { address: Address, detail: String },

    /// Grid dimension unusable with the addressing scheme
    #[error("Invalid grid size {size}: {detail}")]
    InvalidGridSize { size: u16, detail: String },

    /// Exploration rate outside `[0, 1]`
    #[error("Exploration rate must be within [0, 1], got {0}")]
    InvalidEpsilon(f64),

    /// Learning parameter out of range
    #[error("Invalid learning parameter {name}: {value}")]
    InvalidLearningParameter { name: &'static str, value: f64 },

    /// Initial cost must be a finite number
    #[error("Initial cost must be finite, got {0}")]
    InvalidInitialCost(f64),
}

impl RoutingError {
    pub(crate) fn off_grid(address: Address, detail: impl Into<String>) -> Self {
        Self::OffGrid {
            address,
            detail: detail.into(),
        }
    }
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
