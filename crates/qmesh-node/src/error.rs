//! Error types for the router node

use thiserror::Error;

/// Errors that can occur while configuring or running a node
#[derive(Debug, Error)]
pub enum NodeError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] qmesh_core::TransportError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] qmesh_storage::StorageError),

    /// Router construction error
    #[error("Routing error: {0}")]
    Routing(#[from] qmesh_routing::RoutingError),

    /// Node already started
    #[error("Node already started")]
    AlreadyStarted,

    /// Node was stopped and cannot be restarted
    #[error("Node is stopped")]
    Stopped,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(e: toml::de::Error) -> Self {
        NodeError::Config(e.to_string())
    }
}

/// Result type alias for node operations
pub type NodeResult<T> = Result<T, NodeError>;
