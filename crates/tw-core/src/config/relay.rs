//! Relay daemon configuration

use serde::{Deserialize, Serialize};

use super::store::DEFAULT_RELAY_PORT;

/// Configuration for the relay daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to listen on
    pub bind_address: String,

    /// Maximum number of concurrent viewer connections
    pub max_connections: Option<u32>,

    /// Per-connection queue of frames waiting to be written
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_RELAY_PORT),
            max_connections: None,
            outbound_buffer: 256,
        }
    }
}
