//! Mock transport implementation for testing
//!
//! Provides an in-memory datagram network so several routers can run in one
//! process without sockets.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qmesh_core::{Address, MockNetwork, Transport};
//!
//! let network = MockNetwork::new();
//! let a = network.join(Address::v4(10, 0, 1, 1));
//! let b = network.join(Address::v4(10, 0, 1, 2));
//!
//! a.send(&b.local_address(), b"hello".to_vec()).await.unwrap();
//! let (sender, data) = b.recv().await.unwrap();
//! assert_eq!(sender, a.local_address());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

use crate::address::Address;
use crate::error::TransportError;
use crate::transport::Transport;

/// Datagram in flight on the mock network
#[derive(Debug, Clone)]
pub struct MockMessage {
    /// Origin of the datagram
    pub sender: Address,
    /// The datagram payload
    pub data: Vec<u8>,
}

struct NetworkInner {
    /// Inbox of every attached node
    inboxes: DashMap<Address, mpsc::Sender<MockMessage>>,
    /// Per-datagram loss probability as f64 bits
    loss: AtomicU64,
    buffer_size: usize,
}

/// Shared in-memory network
///
/// Cloning yields another handle to the same network.
#[derive(Clone)]
pub struct MockNetwork {
    inner: Arc<NetworkInner>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    /// Create a lossless network with the default inbox size
    pub fn new() -> Self {
        Self::with_buffer_size(1024)
    }

    /// Create a network whose inboxes hold `buffer_size` datagrams
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                inboxes: DashMap::new(),
                loss: AtomicU64::new(0f64.to_bits()),
                buffer_size,
            }),
        }
    }

    /// Attach a node and return its transport
    ///
    /// Re-joining with an address already attached replaces the previous
    /// inbox.
    pub fn join(&self, address: Address) -> MockTransport {
        let (inbox_tx, inbox_rx) = mpsc::channel(self.inner.buffer_size);
        self.inner.inboxes.insert(address, inbox_tx);
        MockTransport {
            local: address,
            network: self.clone(),
            inbox_rx: Mutex::new(inbox_rx),
        }
    }

    /// Detach a node; datagrams to it are then undeliverable
    pub fn leave(&self, address: &Address) {
        self.inner.inboxes.remove(address);
    }

    /// Check if a node is attached
    pub fn is_attached(&self, address: &Address) -> bool {
        self.inner.inboxes.contains_key(address)
    }

    /// Drop each datagram with the given probability (clamped to `[0, 1]`)
    pub fn set_loss(&self, probability: f64) {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self.inner.loss.store(probability.to_bits(), Ordering::Relaxed);
    }

    pub fn loss(&self) -> f64 {
        f64::from_bits(self.inner.loss.load(Ordering::Relaxed))
    }

    fn deliver(&self, message: MockMessage, to: &Address) -> Result<(), TransportError> {
        let inbox = self
            .inner
            .inboxes
            .get(to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::PeerUnreachable(to.to_string()))?;

        let loss = self.loss();
        if loss > 0.0 && rand::rng().random::<f64>() < loss {
            trace!(from = %message.sender, to = %to, "mock network dropped datagram");
            return Ok(());
        }

        inbox.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::SendFailed("inbox full".into()),
            mpsc::error::TrySendError::Closed(_) => TransportError::PeerUnreachable(to.to_string()),
        })
    }
}

/// A node's attachment to a [`MockNetwork`]
pub struct MockTransport {
    local: Address,
    network: MockNetwork,
    inbox_rx: Mutex<mpsc::Receiver<MockMessage>>,
}

impl MockTransport {
    /// The network this transport is attached to
    pub fn network(&self) -> &MockNetwork {
        &self.network
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, peer: &Address, data: Vec<u8>) -> Result<(), TransportError> {
        let message = MockMessage {
            sender: self.local,
            data,
        };
        self.network.deliver(message, peer)
    }

    async fn recv(&self) -> Result<(Address, Vec<u8>), TransportError> {
        let mut inbox = self.inbox_rx.lock().await;
        let message = inbox.recv().await.ok_or(TransportError::ConnectionClosed)?;
        Ok((message.sender, message.data))
    }

    fn local_address(&self) -> Address {
        self.local
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.network.leave(&self.local);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(d: u8) -> Address {
        Address::v4(10, 0, 1, d)
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let network = MockNetwork::new();
        let a = network.join(addr(1));
        let b = network.join(addr(2));

        a.send(&addr(2), b"hello".to_vec()).await.unwrap();
        let (sender, data) = b.recv().await.unwrap();
        assert_eq!(sender, addr(1));
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_unknown_peer_is_unreachable() {
        let network = MockNetwork::new();
        let a = network.join(addr(1));
        let result = a.send(&addr(9), vec![1]).await;
        assert!(matches!(result, Err(TransportError::PeerUnreachable(_))));
    }

    #[tokio::test]
    async fn test_full_loss_drops_everything() {
        let network = MockNetwork::new();
        let a = network.join(addr(1));
        let b = network.join(addr(2));
        network.set_loss(1.0);

        for _ in 0..10 {
            a.send(&addr(2), vec![0]).await.unwrap();
        }
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), b.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_close_detaches() {
        let network = MockNetwork::new();
        let a = network.join(addr(1));
        let b = network.join(addr(2));
        b.close().await.unwrap();

        assert!(!network.is_attached(&addr(2)));
        assert!(a.send(&addr(2), vec![0]).await.is_err());
    }
}
