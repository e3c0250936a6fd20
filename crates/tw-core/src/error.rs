//! Core error types for TeamWall

use std::path::PathBuf;

use thiserror::Error;
use tw_protocol::ProtocolError;

/// Top-level error type for the TeamWall crates
#[derive(Error, Debug)]
pub enum TwError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Sync channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sync channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The transport could not be reached
    #[error("Channel unreachable: {0}")]
    Unreachable(String),

    /// The transport was reachable but the connection is gone
    #[error("Channel disconnected")]
    Disconnected,

    /// No answer within the configured timeout
    #[error("Channel operation timed out")]
    Timeout,

    /// The relay refused the request
    #[error("Rejected by relay: {0}")]
    Rejected(String),

    /// Malformed traffic
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Local persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing store failed
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored value is not valid JSON for the expected type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
