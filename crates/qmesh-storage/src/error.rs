//! Error types for qmesh-storage

use thiserror::Error;

/// Errors that can occur in snapshot storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Node name cannot be used as a storage key
    #[error("Invalid node key: {0:?}")]
    InvalidKey(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<qmesh_core::StorageError> for StorageError {
    fn from(err: qmesh_core::StorageError) -> Self {
        match err {
            qmesh_core::StorageError::Io(msg) => Self::Io(msg),
            qmesh_core::StorageError::Serialization(msg) => Self::Serialization(msg),
            qmesh_core::StorageError::Deserialization(msg) => Self::Deserialization(msg),
        }
    }
}

impl StorageError {
    /// Create a new InvalidKey error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Whether the stored data exists but could not be decoded
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Deserialization(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
