//! tw-core: Roster store and sync plumbing for TeamWall
//!
//! This crate provides the record store that owns the team roster, the
//! listener registry UI code subscribes through, the storage backends the
//! roster is mirrored to, and the sync channels that carry roster updates
//! between viewers.

pub mod channel;
pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ChannelError, StorageError, TwError};
pub use store::{RecordStore, StoreOptions, Subscription};
pub use types::{BroadcastOutcome, BroadcastReport, NetworkStatus};
