//! Core error types for hamgate

use hamgate_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Could not bind the listening socket
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Identity store error
    #[error("Identity store error: {0}")]
    Identity(#[from] IdentityStoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
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
}

/// Errors reading or writing the callsign secret store
#[derive(Error, Debug)]
pub enum IdentityStoreError {
    /// File could not be read or written
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A secret is not valid base32
    #[error("Invalid secret for {callsign}: {reason}")]
    InvalidSecret { callsign: String, reason: String },

    /// Callsign is empty or contains characters outside A-Z, 0-9, '/' and '-'
    #[error("Invalid callsign: {0:?}")]
    InvalidCallsign(String),
}
