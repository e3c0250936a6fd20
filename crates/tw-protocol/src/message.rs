//! Message types for the TeamWall protocol
//!
//! Two layers live here:
//!
//! - [`SyncMessage`]: what viewers say to each other on a named channel.
//!   JSON shape `{"type": "team_update", "data": {"teamMembers": [...],
//!   "timestamp": 1700000000000}}`. Only `team_update` is defined; any other
//!   type is carried through untouched and ignored by viewers.
//! - [`RelayFrame`]: the envelope spoken between a viewer and the relay
//!   daemon. Each frame travels as a header plus JSON payload (see `codec.rs`).
//!
//! # Message Flow
//!
//! 1. Viewer connects and sends `Join` for its channel
//! 2. Relay responds with `Joined`
//! 3. Viewer sends `Publish`; relay forwards it as `Delivery` to every other
//!    member of the channel, never back to the publisher
//! 4. Viewer sends `Presence`; relay answers with `PresenceList`
//! 5. On disconnect the relay drops the viewer from every channel it joined

use serde::{Deserialize, Serialize, Serializer};

use crate::instance::InstanceId;
use crate::member::TeamMember;

/// Type discriminator of the roster update message
pub const TEAM_UPDATE: &str = "team_update";

/// Full-roster replacement broadcast by a viewer after a local edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamUpdate {
    /// The complete roster, in display order
    pub team_members: Vec<TeamMember>,
    /// Wall-clock time of the edit, milliseconds since the Unix epoch.
    /// Carried for diagnostics only; receivers never compare it.
    #[serde(default)]
    pub timestamp: u64,
}

/// A message on a sync channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSyncMessage")]
pub enum SyncMessage {
    /// Full roster replacement
    TeamUpdate(TeamUpdate),
    /// Any message type this version does not understand
    Other {
        kind: String,
        data: serde_json::Value,
    },
}

impl SyncMessage {
    /// Build a `team_update` message
    pub fn team_update(team_members: Vec<TeamMember>, timestamp: u64) -> Self {
        Self::TeamUpdate(TeamUpdate {
            team_members,
            timestamp,
        })
    }

    /// The type discriminator
    pub fn kind(&self) -> &str {
        match self {
            Self::TeamUpdate(_) => TEAM_UPDATE,
            Self::Other { kind, .. } => kind,
        }
    }
}

impl Serialize for SyncMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SyncMessage", 2)?;
        match self {
            Self::TeamUpdate(update) => {
                state.serialize_field("type", TEAM_UPDATE)?;
                state.serialize_field("data", update)?;
            }
            Self::Other { kind, data } => {
                state.serialize_field("type", kind)?;
                state.serialize_field("data", data)?;
            }
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct RawSyncMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawSyncMessage> for SyncMessage {
    type Error = serde_json::Error;

    fn try_from(raw: RawSyncMessage) -> Result<Self, Self::Error> {
        if raw.kind == TEAM_UPDATE {
            serde_json::from_value(raw.data).map(SyncMessage::TeamUpdate)
        } else {
            Ok(SyncMessage::Other {
                kind: raw.kind,
                data: raw.data,
            })
        }
    }
}

/// A viewer subscribed to a channel, as reported by presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Instance identifier
    pub instance: InstanceId,
    /// Human-friendly label (usually the hostname)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Frame kind identifier, carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Join a channel (viewer → relay)
    Join = 0x01,
    /// Leave a channel (viewer → relay)
    Leave = 0x02,
    /// Publish a sync message (viewer → relay)
    Publish = 0x03,
    /// Ask who is on a channel (viewer → relay)
    Presence = 0x04,
    /// Join acknowledgment (relay → viewer)
    Joined = 0x11,
    /// Forwarded sync message (relay → viewer)
    Delivery = 0x12,
    /// Presence answer (relay → viewer)
    PresenceList = 0x13,
    /// Error response
    Error = 0xFF,
}

impl FrameKind {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Leave),
            0x03 => Some(Self::Publish),
            0x04 => Some(Self::Presence),
            0x11 => Some(Self::Joined),
            0x12 => Some(Self::Delivery),
            0x13 => Some(Self::PresenceList),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }
}

/// Relay protocol frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RelayFrame {
    /// Subscribe this connection to a channel
    Join {
        channel: String,
        instance: InstanceId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },

    /// Unsubscribe this connection from a channel
    Leave { channel: String },

    /// Broadcast a message to the other members of a channel
    Publish {
        channel: String,
        message: SyncMessage,
    },

    /// Request the member list of a channel
    Presence { channel: String, request_id: u64 },

    /// The join was accepted
    Joined { channel: String },

    /// A message published by another member
    Delivery {
        channel: String,
        origin: InstanceId,
        message: SyncMessage,
    },

    /// Answer to `Presence`
    PresenceList {
        channel: String,
        request_id: u64,
        peers: Vec<PeerInfo>,
    },

    /// Something went wrong with the last request
    Error { message: String },
}

impl RelayFrame {
    /// Get the frame kind for this frame
    pub fn kind(&self) -> FrameKind {
        match self {
            RelayFrame::Join { .. } => FrameKind::Join,
            RelayFrame::Leave { .. } => FrameKind::Leave,
            RelayFrame::Publish { .. } => FrameKind::Publish,
            RelayFrame::Presence { .. } => FrameKind::Presence,
            RelayFrame::Joined { .. } => FrameKind::Joined,
            RelayFrame::Delivery { .. } => FrameKind::Delivery,
            RelayFrame::PresenceList { .. } => FrameKind::PresenceList,
            RelayFrame::Error { .. } => FrameKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_roundtrip() {
        for kind in [
            FrameKind::Join,
            FrameKind::Leave,
            FrameKind::Publish,
            FrameKind::Presence,
            FrameKind::Joined,
            FrameKind::Delivery,
            FrameKind::PresenceList,
            FrameKind::Error,
        ] {
            let byte = kind.as_u8();
            let recovered = FrameKind::from_u8(byte).unwrap();
            assert_eq!(recovered, kind);
        }
        assert!(FrameKind::from_u8(0x42).is_none());
    }

    #[test]
    fn test_team_update_json_shape() {
        let msg = SyncMessage::team_update(vec![TeamMember::new("1", "Domendra", "Geo Tech")], 42);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "team_update");
        assert_eq!(value["data"]["timestamp"], 42);
        assert_eq!(value["data"]["teamMembers"][0]["id"], "1");
        assert_eq!(value["data"]["teamMembers"][0]["isCompleted"], false);
    }

    #[test]
    fn test_team_update_parses_external_json() {
        let json = r#"{"type":"team_update","data":{"teamMembers":[{"id":"3","name":"Chaitanya","designation":"Hydraulic Engineer","photo":"","task":"Water flow analysis","isCompleted":true}],"timestamp":1700000000000}}"#;
        let msg: SyncMessage = serde_json::from_str(json).unwrap();

        match msg {
            SyncMessage::TeamUpdate(update) => {
                assert_eq!(update.timestamp, 1_700_000_000_000);
                assert_eq!(update.team_members.len(), 1);
                assert!(update.team_members[0].is_completed);
            }
            other => panic!("Expected team_update, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let json = r#"{"type":"cursor_move","data":{"x":1}}"#;
        let msg: SyncMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind(), "cursor_move");

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["type"], "cursor_move");
        assert_eq!(back["data"]["x"], 1);
    }

    #[test]
    fn test_team_update_without_members_is_rejected() {
        let json = r#"{"type":"team_update","data":{"timestamp":1}}"#;
        assert!(serde_json::from_str::<SyncMessage>(json).is_err());
    }

    #[test]
    fn test_relay_frame_tagging() {
        let frame = RelayFrame::Presence {
            channel: "bridge-team-updates".into(),
            request_id: 7,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""op":"presence""#));
        assert_eq!(frame.kind(), FrameKind::Presence);
    }
}
