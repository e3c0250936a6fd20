//! tw-relay: Channel relay for TeamWall viewers
//!
//! The relay accepts TCP connections from viewers, groups them into rooms by
//! channel name, forwards each published roster to every other member of the
//! room and answers presence queries. It keeps no roster of its own.

pub mod server;
pub mod shutdown;
pub mod state;

pub use server::RelayServer;
pub use state::RelayState;
