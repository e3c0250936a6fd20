//! tw-cli: Command-line viewer for TeamWall
//!
//! Provides the `teamwall` CLI for reading and editing the team roster,
//! following updates from other viewers, and running the relay.

pub mod commands;
pub mod output;
pub mod viewer;
