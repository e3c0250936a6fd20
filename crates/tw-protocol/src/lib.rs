//! tw-protocol: Wire protocol for TeamWall roster sync
//!
//! This crate defines the team-member record, the `team_update` sync
//! message shared between viewers, and the framed protocol spoken between
//! viewers and the relay daemon.

pub mod codec;
pub mod error;
pub mod frame;
pub mod instance;
pub mod member;
pub mod message;

pub use codec::RelayCodec;
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use instance::InstanceId;
pub use member::{MemberUpdate, TeamMember};
pub use message::{FrameKind, PeerInfo, RelayFrame, SyncMessage, TeamUpdate, TEAM_UPDATE};
