//! Viewer setup
//!
//! Builds the record store a command works against: storage from the data
//! directory (or memory for ephemeral runs), then a relay connection unless
//! the run is offline or no relay is configured.

use std::sync::Arc;

use tw_core::channel::RelayChannel;
use tw_core::config::StoreConfig;
use tw_core::storage::{FileStorage, MemoryStorage};
use tw_core::traits::KeyValueStorage;
use tw_core::{RecordStore, StoreOptions};
use tw_protocol::InstanceId;

use crate::output::print_warning;

/// How the viewer should run
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerFlags {
    /// Skip the relay entirely
    pub offline: bool,
    /// Keep the roster in memory only
    pub ephemeral: bool,
}

/// Open the store and join the relay if possible
///
/// An unreachable relay is reported and the store stays local-only.
pub async fn open_viewer(config: &StoreConfig, flags: ViewerFlags) -> Arc<RecordStore> {
    let storage: Arc<dyn KeyValueStorage> = if flags.ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(FileStorage::new(config.data_dir.clone()))
    };

    let store = RecordStore::open(storage, StoreOptions::from(config));

    let address = match config.relay_address() {
        Some(address) if !flags.offline => address,
        _ => {
            tracing::debug!("Running local-only");
            return store;
        }
    };

    let instance = InstanceId::generate();
    match RelayChannel::connect(
        address,
        instance,
        Some(config.instance_label()),
        config.connect_timeout,
    )
    .await
    {
        Ok(channel) => {
            store.connect(Arc::new(channel)).await;
        }
        Err(e) => {
            print_warning(&format!("Relay {} unavailable, running local-only: {}", address, e));
        }
    }

    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_offline_viewer_has_no_channel() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..StoreConfig::default()
        };
        let flags = ViewerFlags {
            offline: true,
            ephemeral: false,
        };

        let store = open_viewer(&config, flags).await;

        assert!(!store.is_connected());
        assert_eq!(store.get_all().len(), 9);
        assert!(dir.path().join("bridge_team_data.json").exists());
    }

    #[tokio::test]
    async fn test_unreachable_relay_falls_back_to_local() {
        let config = StoreConfig {
            relay_address: "127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(500),
            ..StoreConfig::default()
        };
        let flags = ViewerFlags {
            offline: false,
            ephemeral: true,
        };

        let store = open_viewer(&config, flags).await;

        assert!(!store.is_connected());
        assert!(store.toggle_completion("1"));
    }
}
