//! Core domain types

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IdentityStoreError;

/// Number of random bytes in a session identifier (128 bits)
const SESSION_ID_BYTES: usize = 16;

/// An operator callsign, always upper-case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Callsign(String);

impl Callsign {
    /// Normalize raw input: trim surrounding whitespace and upper-case
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    /// Parse a callsign for enrolment, rejecting empty or odd input
    ///
    /// Accepts letters, digits, `/` (portable suffixes) and `-` (SSIDs).
    pub fn parse(raw: &str) -> Result<Self, IdentityStoreError> {
        let callsign = Self::normalize(raw);
        let valid = !callsign.0.is_empty()
            && callsign
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '-');

        if valid {
            Ok(callsign)
        } else {
            Err(IdentityStoreError::InvalidCallsign(raw.to_string()))
        }
    }

    /// Get the raw callsign string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Callsign {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}

/// Random identifier for a login session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new identifier from 128 bits of randomness, hex-encoded
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::thread_rng().fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Protocol state of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Socket accepted, banner not yet sent
    Connected,
    /// Waiting for callsign and code
    LoggingIn,
    /// Logged in, at the command prompt
    Authenticated,
    /// Waiting for a fresh code before a write command
    ReauthPending,
    /// Torn down
    Closed,
}

impl ConnectionState {
    /// Whether the connection has completed login
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::ReauthPending)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::LoggingIn => write!(f, "logging-in"),
            ConnectionState::Authenticated => write!(f, "authenticated"),
            ConnectionState::ReauthPending => write!(f, "reauth-pending"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}
