//! Relay command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use tw_core::config::RelayConfig;
use tw_relay::shutdown::spawn_signal_handler;
use tw_relay::RelayServer;

use crate::output::print_success;

/// Run the relay in the foreground until Ctrl+C or SIGTERM
pub async fn relay_command(mut config: RelayConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.bind_address = bind;
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let server = RelayServer::bind(config, cancel).await?;
    print_success(&format!("Relay listening on {}", server.local_addr()?));
    server.run().await?;

    tracing::info!("Relay shutdown complete");
    Ok(())
}
