//! Wire messages
//!
//! Every datagram carries one JSON object tagged by `type`:
//!
//! ```text
//! DATA:     {"type":"DATA","destination":"10.0.3.3","payload":"hi","timestamp":1700000000.5}
//! FEEDBACK: {"type":"FEEDBACK","for_dest":"10.0.3.3","best_estimate":2.71}
//! ```
//!
//! Unknown fields are ignored. In particular a sender claimed inside the
//! payload is never read: the authoritative sender is the datagram origin
//! reported by the transport.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ProtocolError;

/// Largest datagram the router reads in one receive
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// A routed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPacket {
    /// Final destination
    pub destination: Address,
    /// Opaque application payload
    pub payload: String,
    /// Origination time, seconds since the Unix epoch
    pub timestamp: f64,
    /// Forward count, only present when a hop limit is in force
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hops: Option<u32>,
}

impl DataPacket {
    /// Create a packet stamped with the current time
    pub fn new(destination: Address, payload: impl Into<String>) -> Self {
        Self {
            destination,
            payload: payload.into(),
            timestamp: unix_timestamp(),
            hops: None,
        }
    }
}

/// A downstream cost estimate sent back to the previous hop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPacket {
    /// Destination the estimate refers to
    pub for_dest: Address,
    /// Sender's best current cost-to-go for `for_dest`
    pub best_estimate: f64,
}

/// Datagram payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Packet {
    #[serde(rename = "DATA")]
    Data(DataPacket),
    #[serde(rename = "FEEDBACK")]
    Feedback(FeedbackPacket),
}

impl Packet {
    /// Shorthand for a feedback packet
    pub fn feedback(for_dest: Address, best_estimate: f64) -> Self {
        Self::Feedback(FeedbackPacket {
            for_dest,
            best_estimate,
        })
    }

    /// Encode as a JSON datagram
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::EncodingFailed(e.to_string()))
    }

    /// Decode a JSON datagram
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::InvalidMessageFormat(e.to_string()))
    }

    /// Wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "DATA",
            Self::Feedback(_) => "FEEDBACK",
        }
    }
}

impl From<DataPacket> for Packet {
    fn from(data: DataPacket) -> Self {
        Self::Data(data)
    }
}

/// Seconds since the Unix epoch with sub-second precision
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_shape() {
        let raw = br#"{"type":"DATA","destination":"10.0.3.3","payload":"hello","timestamp":1700000000.25}"#;
        let packet = Packet::decode(raw).unwrap();
        match packet {
            Packet::Data(data) => {
                assert_eq!(data.destination, Address::v4(10, 0, 3, 3));
                assert_eq!(data.payload, "hello");
                assert_eq!(data.timestamp, 1700000000.25);
                assert_eq!(data.hops, None);
            }
            other => panic!("expected DATA, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_feedback_accepts_integer_estimate() {
        let raw = br#"{"type":"FEEDBACK","for_dest":"10.0.3.3","best_estimate":0}"#;
        assert_eq!(
            Packet::decode(raw).unwrap(),
            Packet::feedback(Address::v4(10, 0, 3, 3), 0.0)
        );
    }

    #[test]
    fn test_claimed_sender_is_ignored() {
        let raw = br#"{"type":"FEEDBACK","for_dest":"10.0.3.3","best_estimate":1.5,"sender":"10.0.9.9"}"#;
        assert!(matches!(Packet::decode(raw), Ok(Packet::Feedback(_))));
    }

    #[test]
    fn test_encode_omits_absent_hops() {
        let mut data = DataPacket::new(Address::v4(10, 0, 1, 2), "x");
        let json = String::from_utf8(Packet::Data(data.clone()).encode().unwrap()).unwrap();
        assert!(json.contains(r#""type":"DATA""#));
        assert!(!json.contains("hops"));

        data.hops = Some(3);
        let json = String::from_utf8(Packet::Data(data).encode().unwrap()).unwrap();
        assert!(json.contains(r#""hops":3"#));
    }

    #[test]
    fn test_malformed_datagrams_are_rejected() {
        for raw in [
            &b"not json"[..],
            br#"{"type":"PING"}"#,
            br#"{"type":"DATA","destination":"10.0.3.3"}"#,
            br#"{"type":"FEEDBACK","for_dest":"garbage","best_estimate":1.0}"#,
            br#"{"destination":"10.0.3.3","payload":"x","timestamp":1.0}"#,
        ] {
            assert!(
                matches!(Packet::decode(raw), Err(ProtocolError::InvalidMessageFormat(_))),
                "accepted {:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }
}
