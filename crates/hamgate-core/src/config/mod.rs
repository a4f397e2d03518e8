//! Configuration management for hamgate

mod gateway;
mod identities;
pub mod serde_utils;

pub use gateway::{BackendConfig, GatewayConfig, IdentitiesConfig, NetworkConfig, SecurityConfig};
pub use identities::{normalize_secret, IdentityFile};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hamgate")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load and validate the gateway configuration
///
/// A relative identity store path is resolved against the directory that
/// holds the configuration file.
pub fn load_gateway_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = load_config(path)?;

    if config.identities.path.is_relative() {
        if let Some(parent) = path.parent() {
            config.identities.path = parent.join(&config.identities.path);
        }
    }

    config.validate()?;
    Ok(config)
}
