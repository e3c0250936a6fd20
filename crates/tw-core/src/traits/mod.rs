//! Core trait definitions

mod channel;
mod storage;

pub use channel::{ChannelSubscription, Delivery, SyncChannel};
pub use storage::KeyValueStorage;
