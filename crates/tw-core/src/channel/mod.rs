//! Sync channel implementations
//!
//! - [`LocalHub`]: in-process hub, for tests and for several viewers
//!   embedded in one process
//! - [`RelayChannel`]: TCP client of the `tw-relay` daemon

mod local;
mod relay;

pub use local::{LocalChannel, LocalHub};
pub use relay::RelayChannel;

/// Queue depth of each subscriber's delivery buffer
pub const SUBSCRIBER_BUFFER: usize = 64;
