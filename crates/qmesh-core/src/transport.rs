//! Transport abstraction for datagram passing
//!
//! The [`Transport`] trait provides a unified interface for sending and
//! receiving datagrams between nodes. The router loop works against it so the
//! same code drives a real UDP socket and in-memory channels in tests.
//!
//! ## Implementations
//!
//! - [`MockTransport`](crate::MockTransport): In-memory transport (this crate)
//! - `UdpTransport`: Real UDP socket (in qmesh-node)

use async_trait::async_trait;

use crate::address::Address;
use crate::error::TransportError;

/// Unreliable datagram transport between nodes
///
/// Delivery is best effort: a successful `send` says nothing about whether
/// the peer received the datagram. Loss, duplication and reordering are all
/// acceptable.
///
/// # Example
///
/// ```rust,ignore
/// use qmesh_core::{Address, Packet, Transport};
///
/// async fn send_feedback<T: Transport>(transport: &T, to: &Address, dest: Address) {
///     let bytes = Packet::feedback(dest, 0.0).encode().unwrap();
///     let _ = transport.send(to, bytes).await;
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram to a node
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram could not be handed to the network.
    async fn send(&self, peer: &Address, data: Vec<u8>) -> Result<(), TransportError>;

    /// Receive the next datagram from any node
    ///
    /// Blocks until data is available. The returned address is the
    /// datagram's origin as seen by the transport.
    async fn recv(&self) -> Result<(Address, Vec<u8>), TransportError>;

    /// The address this transport sends from
    fn local_address(&self) -> Address;

    /// Release the underlying endpoint
    ///
    /// Default implementation does nothing.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
