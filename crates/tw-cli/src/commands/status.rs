//! Status command implementation

use std::time::Duration;

use anyhow::Result;

use tw_core::RecordStore;

use crate::output::format_status;

/// Execute the status command
///
/// With `watch`, presence is re-queried every `interval` until Ctrl+C.
pub async fn status_command(
    store: &RecordStore,
    relay: Option<&str>,
    watch: bool,
    interval: Duration,
) -> Result<()> {
    let status = store.network_status().await;
    println!("{}", format_status(&status, store.channel_name(), relay));

    if !watch {
        return Ok(());
    }

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(100)));
    // the first tick fires immediately
    ticker.tick().await;
    let mut last = status;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let status = store.network_status().await;
                if status != last {
                    println!("{}", format_status(&status, store.channel_name(), relay));
                    last = status;
                }
            }
        }
    }

    Ok(())
}
