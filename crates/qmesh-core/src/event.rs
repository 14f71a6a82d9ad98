//! Router events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::packet::DataPacket;
use crate::routing::DropReason;

/// Observable outcome of handling one inbound packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouterEvent {
    /// A data packet reached its destination
    Delivered {
        packet: DataPacket,
        from: Address,
        timestamp: DateTime<Utc>,
    },

    /// A data packet was passed to a neighbor
    Forwarded {
        packet: DataPacket,
        from: Address,
        next_hop: Address,
        explored: bool,
        timestamp: DateTime<Utc>,
    },

    /// A data packet was dropped
    Dropped {
        packet: DataPacket,
        from: Address,
        reason: DropReason,
        timestamp: DateTime<Utc>,
    },

    /// A neighbor's estimate was folded into the cost table
    FeedbackApplied {
        from: Address,
        destination: Address,
        estimate: f64,
        previous: f64,
        cost: f64,
        timestamp: DateTime<Utc>,
    },

    /// Feedback arrived from a node that is not a neighbor
    FeedbackIgnored {
        from: Address,
        destination: Address,
        timestamp: DateTime<Utc>,
    },
}

impl RouterEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Delivered { timestamp, .. } => *timestamp,
            Self::Forwarded { timestamp, .. } => *timestamp,
            Self::Dropped { timestamp, .. } => *timestamp,
            Self::FeedbackApplied { timestamp, .. } => *timestamp,
            Self::FeedbackIgnored { timestamp, .. } => *timestamp,
        }
    }

    /// The data packet involved, if any
    pub fn data(&self) -> Option<&DataPacket> {
        match self {
            Self::Delivered { packet, .. }
            | Self::Forwarded { packet, .. }
            | Self::Dropped { packet, .. } => Some(packet),
            _ => None,
        }
    }

    /// Create a delivered event
    pub fn delivered(packet: DataPacket, from: Address) -> Self {
        Self::Delivered {
            packet,
            from,
            timestamp: Utc::now(),
        }
    }

    /// Create a forwarded event
    pub fn forwarded(packet: DataPacket, from: Address, next_hop: Address, explored: bool) -> Self {
        Self::Forwarded {
            packet,
            from,
            next_hop,
            explored,
            timestamp: Utc::now(),
        }
    }

    /// Create a dropped event
    pub fn dropped(packet: DataPacket, from: Address, reason: DropReason) -> Self {
        Self::Dropped {
            packet,
            from,
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Create a feedback applied event
    pub fn feedback_applied(
        from: Address,
        destination: Address,
        estimate: f64,
        previous: f64,
        cost: f64,
    ) -> Self {
        Self::FeedbackApplied {
            from,
            destination,
            estimate,
            previous,
            cost,
            timestamp: Utc::now(),
        }
    }

    /// Create a feedback ignored event
    pub fn feedback_ignored(from: Address, destination: Address) -> Self {
        Self::FeedbackIgnored {
            from,
            destination,
            timestamp: Utc::now(),
        }
    }
}
