//! UDP transport
//!
//! One socket per router. Peers are reached at `peer:peer_port` unless a
//! per-peer socket override is registered, which lets several routers share
//! one host. Inbound origins matching an override are reported as that
//! peer's address.

use std::net::SocketAddr;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use qmesh_core::{Address, MAX_DATAGRAM_SIZE, Transport, TransportError};

/// Router transport over a tokio UDP socket
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local: Address,
    peer_port: u16,
    overrides: DashMap<Address, SocketAddr>,
    origins: DashMap<SocketAddr, Address>,
}

impl UdpTransport {
    /// Bind `bind` for the node whose address is `local`
    pub async fn bind(bind: SocketAddr, local: Address, peer_port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| TransportError::BindFailed(format!("{bind}: {e}")))?;
        debug!(bind = %bind, local = %local, "UDP socket bound");
        Ok(Self {
            socket,
            local,
            peer_port,
            overrides: DashMap::new(),
            origins: DashMap::new(),
        })
    }

    /// Route datagrams for `peer` to `socket`
    pub fn add_peer(&self, peer: Address, socket: SocketAddr) {
        if let Some(previous) = self.overrides.insert(peer, socket) {
            self.origins.remove(&previous);
        }
        self.origins.insert(socket, peer);
    }

    /// Socket address actually bound
    pub fn local_socket_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::BindFailed(e.to_string()))
    }

    /// Where datagrams for `peer` are sent
    pub fn resolve(&self, peer: &Address) -> SocketAddr {
        self.overrides
            .get(peer)
            .map(|entry| *entry.value())
            .unwrap_or_else(|| peer.socket_addr(self.peer_port))
    }

    fn origin_of(&self, socket: SocketAddr) -> Address {
        self.origins
            .get(&socket)
            .map(|entry| *entry.value())
            .unwrap_or_else(|| Address::from_socket_addr(socket))
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, peer: &Address, data: Vec<u8>) -> Result<(), TransportError> {
        let target = self.resolve(peer);
        trace!(peer = %peer, target = %target, len = data.len(), "Sending datagram");
        self.socket
            .send_to(&data, target)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::SendFailed(format!("{target}: {e}")))
    }

    async fn recv(&self) -> Result<(Address, Vec<u8>), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, origin) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        buf.truncate(len);
        Ok((self.origin_of(origin), buf))
    }

    fn local_address(&self) -> Address {
        self.local
    }
}
