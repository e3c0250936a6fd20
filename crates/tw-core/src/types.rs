//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connectivity summary shown by the "connected peers" indicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Whether the presence query succeeded
    pub connected: bool,
    /// Other viewers on the channel
    pub peers: usize,
}

impl NetworkStatus {
    /// Status reported whenever presence cannot be determined
    pub fn offline() -> Self {
        Self {
            connected: false,
            peers: 0,
        }
    }

    pub fn online(peers: usize) -> Self {
        Self {
            connected: true,
            peers,
        }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.connected { "Connected" } else { "Offline" };
        let plural = if self.peers == 1 { "" } else { "s" };
        write!(f, "{} ({} peer{})", state, self.peers, plural)
    }
}

/// What became of one roster broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastOutcome {
    /// Handed to the transport
    Sent,
    /// No channel, or the channel refused the message
    Unreachable,
    /// The attempt could not complete (no runtime, or timed out)
    Unknown,
}

impl fmt::Display for BroadcastOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastOutcome::Sent => write!(f, "sent"),
            BroadcastOutcome::Unreachable => write!(f, "unreachable"),
            BroadcastOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// Record of a broadcast attempt, published on the store's outcome feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    /// Timestamp the roster was tagged with
    pub timestamp: u64,
    /// Result of the attempt
    pub outcome: BroadcastOutcome,
}
