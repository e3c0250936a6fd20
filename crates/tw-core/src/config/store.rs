//! Viewer-side configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Default relay port
pub const DEFAULT_RELAY_PORT: u16 = 47600;

/// Configuration for a viewer's record store and sync channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the persisted roster
    pub data_dir: PathBuf,

    /// Storage key the roster is written under
    pub storage_key: String,

    /// Sync channel name shared by all viewers of one wall
    pub channel: String,

    /// Relay to connect to; empty runs local-only
    pub relay_address: String,

    /// Connect and presence timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// How often `status --watch` re-checks presence
    #[serde(with = "duration_secs")]
    pub status_interval: Duration,

    /// Label shown to other viewers (defaults to hostname)
    pub label: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: super::default_data_dir(),
            storage_key: "bridge_team_data".to_string(),
            channel: "bridge-team-updates".to_string(),
            relay_address: format!("127.0.0.1:{}", DEFAULT_RELAY_PORT),
            connect_timeout: Duration::from_secs(5),
            status_interval: Duration::from_secs(5),
            label: None,
        }
    }
}

impl StoreConfig {
    /// Relay address, or `None` for local-only mode
    pub fn relay_address(&self) -> Option<&str> {
        let trimmed = self.relay_address.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    /// Get the viewer label, falling back to hostname
    pub fn instance_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.storage_key, "bridge_team_data");
        assert_eq!(config.channel, "bridge-team-updates");
        assert_eq!(config.relay_address(), Some("127.0.0.1:47600"));
        assert_eq!(config.status_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_relay_means_local_only() {
        let config = StoreConfig {
            relay_address: "   ".to_string(),
            ..StoreConfig::default()
        };
        assert_eq!(config.relay_address(), None);
    }

    #[test]
    fn test_label_override() {
        let config = StoreConfig {
            label: Some("lobby-screen".to_string()),
            ..StoreConfig::default()
        };
        assert_eq!(config.instance_label(), "lobby-screen");
        assert!(!StoreConfig::default().instance_label().is_empty());
    }
}
