//! Output formatting utilities for the CLI
//!
//! Tables for the roster, the single-member card, the network indicator
//! line and colored status messages.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use tw_core::NetworkStatus;
use tw_protocol::TeamMember;

/// Format the roster as an ASCII table
///
/// The long form adds the photo column, wrapped to keep data URIs from
/// flooding the terminal.
pub fn format_roster(members: &[TeamMember], long: bool) -> String {
    if members.is_empty() {
        return "No team members".to_string();
    }

    #[derive(Tabled)]
    struct MemberRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "DESIGNATION")]
        designation: String,
        #[tabled(rename = "TASK")]
        task: String,
        #[tabled(rename = "STATUS")]
        status: &'static str,
    }

    #[derive(Tabled)]
    struct MemberRowDetailed {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "DESIGNATION")]
        designation: String,
        #[tabled(rename = "TASK")]
        task: String,
        #[tabled(rename = "STATUS")]
        status: &'static str,
        #[tabled(rename = "PHOTO")]
        photo: String,
    }

    if long {
        let rows: Vec<MemberRowDetailed> = members
            .iter()
            .map(|m| MemberRowDetailed {
                id: m.id.clone(),
                name: m.name.clone(),
                designation: m.designation.clone(),
                task: m.task.clone(),
                status: status_label(m.is_completed),
                photo: truncate(&m.photo, 60),
            })
            .collect();

        Table::new(rows)
            .with(Style::rounded())
            .with(Width::wrap(140))
            .to_string()
    } else {
        let rows: Vec<MemberRow> = members
            .iter()
            .map(|m| MemberRow {
                id: m.id.clone(),
                name: m.name.clone(),
                designation: m.designation.clone(),
                task: truncate(&m.task, 40),
                status: status_label(m.is_completed),
            })
            .collect();

        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Totals line shown under the roster
pub fn format_progress(members: &[TeamMember]) -> String {
    let done = members.iter().filter(|m| m.is_completed).count();
    format!(
        "Team Members: {}  Completed: {}  In Progress: {}",
        members.len(),
        done,
        members.len() - done
    )
}

/// Format one member as a key/value card
pub fn format_member(member: &TeamMember) -> String {
    let mut output = String::new();
    output.push_str(&format!("ID:          {}\n", member.id));
    output.push_str(&format!("Name:        {}\n", member.name));
    output.push_str(&format!("Designation: {}\n", member.designation));
    output.push_str(&format!("Task:        {}\n", member.task));
    output.push_str(&format!("Status:      {}\n", status_label(member.is_completed)));
    output.push_str(&format!("Photo:       {}\n", truncate(&member.photo, 80)));
    output
}

/// Format the network indicator
pub fn format_status(status: &NetworkStatus, channel: &str, relay: Option<&str>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Network: {}\n", status));
    output.push_str(&format!("Channel: {}\n", channel));
    output.push_str(&format!("Relay:   {}\n", relay.unwrap_or("none (local-only)")));
    output
}

fn status_label(completed: bool) -> &'static str {
    if completed {
        "done"
    } else {
        "pending"
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
