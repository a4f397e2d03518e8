//! Callsign secret store

use std::collections::HashMap;
use std::path::Path;

use totp_rs::{Algorithm, Secret, TOTP};

use hamgate_core::config::{normalize_secret, IdentityFile};
use hamgate_core::{Callsign, IdentityStoreError};

/// Digits in a one-time code
pub const CODE_DIGITS: usize = 6;

/// Seconds per time step
pub const CODE_STEP_SECS: u64 = 30;

/// Steps of clock drift tolerated either side of now (3 x 30s = 90s)
pub const CODE_SKEW_STEPS: u8 = 3;

/// Issuer shown in authenticator apps
pub const ISSUER: &str = "HamGate";

/// Immutable snapshot of enrolled callsigns and their code generators
#[derive(Debug, Default)]
pub struct IdentityStore {
    generators: HashMap<String, TOTP>,
}

impl IdentityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from a file, never failing
    ///
    /// A missing file gives an empty store. A file that does not parse gives
    /// an empty store and a warning. Individual entries with undecodable
    /// secrets are skipped with a warning.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!("Identity store not found at {:?}; no callsigns can log in", path);
            return Self::new();
        }

        match IdentityFile::load(path) {
            Ok(file) => {
                let store = Self::from_secrets(file.users.iter());
                tracing::info!("Loaded {} callsigns from {:?}", store.len(), path);
                store
            }
            Err(e) => {
                tracing::warn!("Failed to load identity store {:?}: {}", path, e);
                Self::new()
            }
        }
    }

    /// Build a store from callsign/secret pairs, skipping invalid secrets
    pub fn from_secrets<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut generators = HashMap::new();

        for (callsign, secret) in entries {
            let callsign = Callsign::normalize(callsign.as_ref());
            match build_generator(&callsign, secret.as_ref()) {
                Ok(totp) => {
                    generators.insert(callsign.to_string(), totp);
                }
                Err(e) => {
                    tracing::warn!("Skipping identity {}: {}", callsign, e);
                }
            }
        }

        Self { generators }
    }

    /// Generator for a normalized callsign
    pub fn get(&self, callsign: &str) -> Option<&TOTP> {
        self.generators.get(callsign)
    }

    pub fn contains(&self, callsign: &str) -> bool {
        self.generators.contains_key(callsign)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

/// Build a code generator for a base32 secret
///
/// Secrets shorter than 128 bits are accepted so existing enrolments keep
/// working; new secrets from [`generate_secret`] are 160 bits.
pub fn build_generator(callsign: &Callsign, secret: &str) -> Result<TOTP, IdentityStoreError> {
    let invalid = |reason: String| IdentityStoreError::InvalidSecret {
        callsign: callsign.to_string(),
        reason,
    };

    let bytes = Secret::Encoded(normalize_secret(secret))
        .to_bytes()
        .map_err(|e| invalid(e.to_string()))?;

    if bytes.is_empty() {
        return Err(invalid("secret is empty".to_string()));
    }

    Ok(TOTP::new_unchecked(
        Algorithm::SHA1,
        CODE_DIGITS,
        CODE_SKEW_STEPS,
        CODE_STEP_SECS,
        bytes,
        Some(ISSUER.to_string()),
        callsign.to_string(),
    ))
}

/// Generate a fresh 160-bit secret, base32-encoded without padding
pub fn generate_secret() -> String {
    normalize_secret(&Secret::generate_secret().to_encoded().to_string())
}

/// Whether a string is exactly six ASCII digits
pub fn is_code_format(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}
