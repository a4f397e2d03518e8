//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Shortest line limit that still fits a command with arguments
const MIN_LINE_LENGTH: usize = 16;

/// Configuration for the gateway daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    pub network: NetworkConfig,
    /// Login and admission settings
    pub security: SecurityConfig,
    /// Callsign secret store
    pub identities: IdentitiesConfig,
    /// Home automation backend
    pub backend: BackendConfig,
}

impl GatewayConfig {
    /// Check values that would make the gateway unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "network.max_connections must be at least 1".to_string(),
            ));
        }
        if self.network.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "network.idle_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.network.max_line_length < MIN_LINE_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "network.max_line_length must be at least {}",
                MIN_LINE_LENGTH
            )));
        }
        if self.security.max_login_attempts == 0 {
            return Err(ConfigError::Invalid(
                "security.max_login_attempts must be at least 1".to_string(),
            ));
        }
        if self.security.session_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "security.session_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.backend.page_size == 0 {
            return Err(ConfigError::Invalid(
                "backend.page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Maximum simultaneous connections
    pub max_connections: usize,

    /// How long the command prompt waits for input
    #[serde(rename = "idle_timeout_seconds", with = "duration_secs")]
    pub idle_timeout: Duration,

    /// Expect the callsign as the first, unprompted line (BPQ node behaviour)
    pub legacy_mode: bool,

    /// Inbound lines longer than this are truncated
    pub max_line_length: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8023,
            max_connections: 10,
            idle_timeout: Duration::from_secs(300),
            legacy_mode: true,
            max_line_length: hamgate_protocol::DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl NetworkConfig {
    /// `host:port`, bracketing IPv6 literals
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Login and admission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Login attempts allowed per connection
    pub max_login_attempts: u32,

    /// Text shown in a box when a client connects; empty disables it
    pub banner_text: String,

    /// Addresses or CIDR prefixes allowed to connect; empty allows all
    pub ip_allowlist: Vec<String>,

    /// Inactivity after which a login session expires
    #[serde(rename = "session_timeout_seconds", with = "duration_secs")]
    pub session_timeout: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 3,
            banner_text: "HamGate".to_string(),
            ip_allowlist: Vec::new(),
            session_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Callsign secret store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitiesConfig {
    /// Path to the TOML file holding `[users]`
    pub path: PathBuf,
}

impl Default for IdentitiesConfig {
    fn default() -> Self {
        Self {
            path: super::default_config_dir().join("users.toml"),
        }
    }
}

/// Home automation backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the REST API; empty disables the backend
    pub url: String,

    /// Long-lived bearer token
    pub token: String,

    /// Per-request timeout
    #[serde(rename = "request_timeout_seconds", with = "duration_secs")]
    pub request_timeout: Duration,

    /// How long fetched entity states are reused
    #[serde(rename = "cache_ttl_seconds", with = "duration_secs")]
    pub cache_ttl: Duration,

    /// Entities per listing page
    pub page_size: usize,

    /// Domains to expose; empty exposes all
    pub include_domains: Vec<String>,

    /// Entity id glob patterns to hide
    pub exclude_entities: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(60),
            page_size: 10,
            include_domains: Vec::new(),
            exclude_entities: Vec::new(),
        }
    }
}

impl BackendConfig {
    /// Whether a backend URL has been configured
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}
