//! Home automation backend
//!
//! The connection handler only sees [`CommandExecutor`]. The Home Assistant
//! implementation talks to the REST API; [`NullExecutor`] stands in when no
//! backend is configured.

mod client;
mod entities;
mod executor;
pub mod format;

use async_trait::async_trait;

use hamgate_protocol::Command;

pub use client::HomeAssistantClient;
pub use entities::{glob_match, Entity, EntityFilter, EntityMapper};
pub use executor::HomeAssistantExecutor;

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transport failure or timeout
    #[error("cannot reach backend: {0}")]
    Connection(#[from] reqwest::Error),

    /// Token rejected
    #[error("backend rejected the access token")]
    Unauthorized,

    /// Endpoint or entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other error status
    #[error("backend error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body was not what was expected
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Runs a parsed command and renders the reply lines
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command
    ///
    /// Domain problems (unknown device, unsupported value) come back as
    /// `ERR:` lines in `Ok`. An `Err` means the command could not be
    /// processed at all.
    async fn execute(&self, command: &Command) -> Result<Vec<String>, BackendError>;
}

/// Executor used when no backend URL is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExecutor;

#[async_trait]
impl CommandExecutor for NullExecutor {
    async fn execute(&self, command: &Command) -> Result<Vec<String>, BackendError> {
        Ok(match command {
            Command::Help => format::main_menu(),
            Command::Refresh => vec![format::ok_line("Refreshed 0 entities")],
            Command::Quit => vec!["73!".to_string()],
            _ => format::error_lines("Backend not configured", None),
        })
    }
}
