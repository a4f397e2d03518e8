//! hamgate-core: Core types and configuration for hamgate
//!
//! This crate provides the error taxonomy, configuration structures and
//! shared domain types used by the gateway daemon and the operator CLI.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::{ConfigError, GatewayError, IdentityStoreError};
pub use types::{Callsign, ConnectionState, SessionId};
