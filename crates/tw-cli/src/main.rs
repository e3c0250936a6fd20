//! TeamWall CLI
//!
//! Single binary for the team wall:
//! - Viewer commands (list, show, update, toggle, watch, status)
//! - Relay (forwards roster updates between viewers)
//! - Configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teamwall::commands;
use teamwall::viewer::{open_viewer, ViewerFlags};
use tw_core::config;
use tw_protocol::MemberUpdate;

#[derive(Parser)]
#[command(name = "teamwall")]
#[command(author, version, about = "Shared team progress wall")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Do not connect to the relay
    #[arg(long, global = true)]
    offline: bool,

    /// Keep the roster in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the team roster
    /// Alias: ls
    #[command(alias = "ls")]
    List {
        /// Show detailed information
        #[arg(short, long)]
        long: bool,
    },

    /// Show one team member
    Show {
        /// Member id
        id: String,
    },

    /// Edit a team member
    Update {
        /// Member id
        id: String,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New role or title
        #[arg(long)]
        designation: Option<String>,
        /// New photo URL or data URI
        #[arg(long)]
        photo: Option<String>,
        /// New task description
        #[arg(long)]
        task: Option<String>,
        /// Mark the task done (true) or not (false)
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Flip a member's task between done and in progress
    Toggle {
        /// Member id
        id: String,
    },

    /// Show the network indicator
    Status {
        /// Keep re-checking until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },

    /// Print the roster on every change until Ctrl+C
    Watch {
        /// Show detailed information
        #[arg(short, long)]
        long: bool,
    },

    /// Run the relay in the foreground
    Relay {
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let command = cli.command.unwrap_or(Commands::List { long: false });

    // Config commands work on the file itself, even a broken one
    if let Commands::Config { action } = command {
        let path = cli.config.as_deref();
        return match action {
            ConfigAction::Show => commands::config_show(path),
            ConfigAction::Path => commands::config_path(path),
            ConfigAction::Init { force } => commands::config_init(path, force),
        };
    }

    let config = config::resolve_config(cli.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    if let Commands::Relay { bind } = command {
        return commands::relay_command(config.relay, bind).await;
    }

    let flags = ViewerFlags {
        offline: cli.offline,
        ephemeral: cli.ephemeral,
    };
    let store = open_viewer(&config.store, flags).await;

    match command {
        Commands::List { long } => commands::list_command(&store, long),
        Commands::Show { id } => commands::show_command(&store, &id),
        Commands::Update {
            id,
            name,
            designation,
            photo,
            task,
            completed,
        } => {
            let update = MemberUpdate {
                name,
                designation,
                photo,
                task,
                is_completed: completed,
            };
            commands::update_command(&store, &id, update).await
        }
        Commands::Toggle { id } => commands::toggle_command(&store, &id).await,
        Commands::Status { watch } => {
            let relay = if cli.offline {
                None
            } else {
                config.store.relay_address()
            };
            commands::status_command(&store, relay, watch, config.store.status_interval).await
        }
        Commands::Watch { long } => commands::watch_command(&store, long).await,
        Commands::Relay { .. } | Commands::Config { .. } => Ok(()),
    }
}
