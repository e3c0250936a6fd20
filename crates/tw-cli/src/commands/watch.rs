//! Watch command implementation

use anyhow::Result;
use tokio::sync::mpsc;

use tw_core::RecordStore;

use crate::output::{format_progress, format_roster, print_info};

/// Print the roster now and again after every change, until Ctrl+C
pub async fn watch_command(store: &RecordStore, long: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = store.subscribe(move |members| {
        let _ = tx.send(members);
    });

    if !store.is_connected() {
        print_info("Not connected to a relay; updates from other viewers will not arrive");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            members = rx.recv() => {
                let Some(members) = members else { break };
                println!("{}", format_roster(&members, long));
                println!("{}", format_progress(&members));
            }
        }
    }

    subscription.unsubscribe();
    Ok(())
}
