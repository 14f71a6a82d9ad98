//! Error types for qmesh

use thiserror::Error;

/// Errors related to node addresses
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),
}

/// Errors related to cost table persistence
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Errors related to datagram transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),
}

/// Errors related to wire message handling
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}
