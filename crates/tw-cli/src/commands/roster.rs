//! Roster commands: list, show, update, toggle

use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::broadcast;

use tw_core::{BroadcastOutcome, BroadcastReport, RecordStore};
use tw_protocol::MemberUpdate;

use crate::output::{
    format_member, format_progress, format_roster, print_info, print_success, print_warning,
};

/// Execute the list command
pub fn list_command(store: &RecordStore, long: bool) -> Result<()> {
    let members = store.get_all();
    println!("{}", format_roster(&members, long));
    println!("{}", format_progress(&members));
    Ok(())
}

/// Execute the show command
pub fn show_command(store: &RecordStore, id: &str) -> Result<()> {
    match store.get_member(id) {
        Some(member) => {
            print!("{}", format_member(&member));
            Ok(())
        }
        None => {
            print_warning(&format!("No team member with id {}", id));
            Ok(())
        }
    }
}

/// Execute the update command
pub async fn update_command(store: &RecordStore, id: &str, update: MemberUpdate) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update; pass at least one of --name, --designation, --photo, --task, --completed");
    }

    let outcomes = store.broadcast_outcomes();
    if !store.update_member(id, &update) {
        print_warning(&format!("No team member with id {}", id));
        return Ok(());
    }

    print_success(&format!("Updated member {}", id));
    report_broadcast(outcomes, store.options().publish_timeout).await;
    Ok(())
}

/// Execute the toggle command
pub async fn toggle_command(store: &RecordStore, id: &str) -> Result<()> {
    let outcomes = store.broadcast_outcomes();
    if !store.toggle_completion(id) {
        print_warning(&format!("No team member with id {}", id));
        return Ok(());
    }

    if let Some(member) = store.get_member(id) {
        let state = if member.is_completed { "completed" } else { "in progress" };
        print_success(&format!("{} is now {}", member.name, state));
    }
    report_broadcast(outcomes, store.options().publish_timeout).await;
    Ok(())
}

/// Wait for the outcome of the mutation just made and tell the user
async fn report_broadcast(mut outcomes: broadcast::Receiver<BroadcastReport>, wait: Duration) {
    let report = match tokio::time::timeout(wait, outcomes.recv()).await {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            tracing::debug!("Outcome feed closed: {}", e);
            return;
        }
        Err(_) => {
            print_warning("Timed out waiting for the broadcast; other viewers may be out of date");
            return;
        }
    };

    match report.outcome {
        BroadcastOutcome::Sent => print_info("Change sent to other viewers"),
        BroadcastOutcome::Unreachable => print_info("Saved locally; no relay connection"),
        BroadcastOutcome::Unknown => {
            print_warning("Saved locally; could not confirm the broadcast")
        }
    }
}
