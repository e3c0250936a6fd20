//! Roster seeded on first run

use tw_protocol::TeamMember;

const PENDING_COLOR: &str = "2563eb";
const DONE_COLOR: &str = "22c55e";

/// Generated avatar for a member; green for finished work, blue otherwise
pub fn avatar_url(name: &str, completed: bool) -> String {
    let background = if completed { DONE_COLOR } else { PENDING_COLOR };
    format!(
        "https://ui-avatars.com/api/?name={}&background={}&color=ffffff&size=150",
        name.replace(' ', "+"),
        background
    )
}

fn seed(id: &str, name: &str, designation: &str, task: &str, completed: bool) -> TeamMember {
    TeamMember {
        id: id.to_string(),
        name: name.to_string(),
        designation: designation.to_string(),
        photo: avatar_url(name, completed),
        task: task.to_string(),
        is_completed: completed,
    }
}

/// The nine members written to storage the first time a store opens
pub fn default_team() -> Vec<TeamMember> {
    vec![
        seed("1", "Domendra", "Geo Tech", "Soil analysis for foundation design", false),
        seed("2", "Jairul", "Surveyor", "Site topographical survey", false),
        seed("3", "Chaitanya", "Hydraulic Engineer", "Water flow analysis", true),
        seed("4", "Laxmi", "Hydraulic Engineer", "Drainage system design", false),
        seed("5", "Nelam", "Draftsman", "Technical drawings preparation", true),
        seed("6", "Gulesh", "Draftsman", "CAD model development", false),
        seed("7", "Gunja", "Draftsman", "Blueprint finalization", false),
        seed("8", "Mayank", "Team Leader", "Project coordination", false),
        seed("9", "Raghu Sir", "Team Head", "Overall project supervision", false),
    ]
}
