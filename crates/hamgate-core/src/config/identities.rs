//! Callsign secret store file
//!
//! ```toml
//! [users]
//! KN4XYZ = "JBSWY3DPEHPK3PXP"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::IdentityStoreError;
use crate::types::Callsign;

/// On-disk mapping of callsign to base32 TOTP secret
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityFile {
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

impl IdentityFile {
    /// Read and parse a store, upper-casing callsigns
    pub fn load(path: &Path) -> Result<Self, IdentityStoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| IdentityStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse store contents, upper-casing callsigns
    pub fn parse(content: &str) -> Result<Self, IdentityStoreError> {
        let raw: IdentityFile = toml::from_str(content)?;
        let users = raw
            .users
            .into_iter()
            .map(|(callsign, secret)| (Callsign::normalize(&callsign).to_string(), secret))
            .collect();
        Ok(Self { users })
    }

    /// Write the store, readable only by the owner on Unix
    pub fn save(&self, path: &Path) -> Result<(), IdentityStoreError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| IdentityStoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        Ok(())
    }

    /// Add or replace a callsign's secret
    pub fn insert(&mut self, callsign: &Callsign, secret: &str) -> Option<String> {
        self.users
            .insert(callsign.to_string(), normalize_secret(secret))
    }

    pub fn get(&self, callsign: &Callsign) -> Option<&str> {
        self.users.get(callsign.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Canonical base32 form: upper-case, no whitespace, no `=` padding
pub fn normalize_secret(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect::<String>()
        .to_uppercase()
}
