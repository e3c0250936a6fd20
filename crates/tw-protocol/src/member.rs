//! Team member records
//!
//! The JSON field names (`id`, `name`, `designation`, `photo`, `task`,
//! `isCompleted`) are shared by local storage and the sync channel, so they
//! must not change. Absent fields decode to their defaults.

use serde::{Deserialize, Serialize};

/// One person on the wall
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamMember {
    /// Identifier, unique within a roster
    pub id: String,
    /// Display name
    pub name: String,
    /// Role or title
    pub designation: String,
    /// Photo URL or data URI
    pub photo: String,
    /// Current task description
    pub task: String,
    /// Whether the task is done
    pub is_completed: bool,
}

impl TeamMember {
    /// Create a member with an empty task
    pub fn new(id: impl Into<String>, name: impl Into<String>, designation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            designation: designation.into(),
            ..Self::default()
        }
    }

    /// Merge the fields present in `update` into this record
    pub fn apply(&mut self, update: &MemberUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(designation) = &update.designation {
            self.designation.clone_from(designation);
        }
        if let Some(photo) = &update.photo {
            self.photo.clone_from(photo);
        }
        if let Some(task) = &update.task {
            self.task.clone_from(task);
        }
        if let Some(done) = update.is_completed {
            self.is_completed = done;
        }
    }
}

/// Partial edit of a member; `None` leaves the field unchanged
///
/// The id is not editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl MemberUpdate {
    /// Empty update that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the role or title
    pub fn designation(mut self, designation: impl Into<String>) -> Self {
        self.designation = Some(designation.into());
        self
    }

    /// Set the photo URL or data URI
    pub fn photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Set the task description
    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Set the completion flag
    pub fn completed(mut self, done: bool) -> Self {
        self.is_completed = Some(done);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.designation.is_none()
            && self.photo.is_none()
            && self.task.is_none()
            && self.is_completed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let member = TeamMember {
            id: "1".into(),
            name: "Domendra".into(),
            designation: "Geo Tech".into(),
            photo: "data:image/png;base64,AAAA".into(),
            task: "Soil analysis".into(),
            is_completed: true,
        };

        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value["isCompleted"], serde_json::Value::Bool(true));
        assert_eq!(value["designation"], "Geo Tech");
        assert!(value.get("is_completed").is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let member: TeamMember = serde_json::from_str(r#"{"id":"7","name":"Gunja"}"#).unwrap();
        assert_eq!(member.id, "7");
        assert_eq!(member.task, "");
        assert_eq!(member.photo, "");
        assert!(!member.is_completed);
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut member = TeamMember::new("2", "Jairul", "Surveyor");
        member.task = "Site survey".into();

        member.apply(&MemberUpdate::new().task("Boundary survey").completed(true));

        assert_eq!(member.name, "Jairul");
        assert_eq!(member.designation, "Surveyor");
        assert_eq!(member.task, "Boundary survey");
        assert!(member.is_completed);
    }

    #[test]
    fn test_partial_update_from_json() {
        let update: MemberUpdate = serde_json::from_str(r#"{"task":"x"}"#).unwrap();
        assert_eq!(update.task.as_deref(), Some("x"));
        assert!(update.name.is_none());
        assert!(!update.is_empty());
        assert!(MemberUpdate::new().is_empty());
    }
}
