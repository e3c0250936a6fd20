//! CLI command implementations

mod config;
mod relay;
mod roster;
mod status;
mod watch;

pub use config::{config_init, config_path, config_show};
pub use relay::relay_command;
pub use roster::{list_command, show_command, toggle_command, update_command};
pub use status::status_command;
pub use watch::watch_command;
