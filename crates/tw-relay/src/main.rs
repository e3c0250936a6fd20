//! TeamWall relay daemon
//!
//! Forwards roster updates between viewers on the same channel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tw_core::config;
use tw_relay::shutdown::spawn_signal_handler;
use tw_relay::RelayServer;

#[derive(Parser)]
#[command(name = "tw-relay")]
#[command(about = "TeamWall channel relay")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TeamWall relay starting...");

    let config = config::resolve_config(args.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut relay_config = config.relay;
    if let Some(bind) = args.bind {
        relay_config.bind_address = bind;
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let server = RelayServer::bind(relay_config, cancel).await?;
    server.run().await?;

    tracing::info!("Relay shutdown complete");
    Ok(())
}
