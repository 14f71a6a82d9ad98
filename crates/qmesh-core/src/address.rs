//! Node addresses
//!
//! An [`Address`] is the only identity a node has. Routing relies on
//! equality and hashing alone; the total order exists so persisted tables
//! and logs render deterministically.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Network address identifying a node.
///
/// Serialized as its textual form (`"10.0.1.1"`), both on the wire and in
/// persisted snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(IpAddr);

impl Address {
    /// Wrap an IP address
    pub const fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    /// Build an IPv4 address from its octets
    pub const fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
    }

    /// The underlying IP address
    pub fn ip(&self) -> IpAddr {
        self.0
    }

    /// The octets if this is an IPv4 address
    pub fn ipv4_octets(&self) -> Option<[u8; 4]> {
        match self.0 {
            IpAddr::V4(v4) => Some(v4.octets()),
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(|v4| v4.octets()),
        }
    }

    /// Socket address for this node on the given port
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.0, port)
    }

    /// Node address of a datagram origin.
    ///
    /// IPv4-mapped IPv6 origins are normalized so a dual-stack socket yields
    /// the same address as a plain IPv4 one.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => Self(IpAddr::V4(v4)),
                None => Self(IpAddr::V6(v6)),
            },
            ip => Self(ip),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|_| IdentityError::InvalidFormat(s.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Self(IpAddr::V4(ip))
    }
}
