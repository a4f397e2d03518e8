//! TOTP verification with rate limiting and replay protection

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::time::Instant;
use totp_rs::TOTP;

use hamgate_core::time::current_time_secs;
use hamgate_core::Callsign;

use super::failures::FailureLog;
use super::replay::{ReplayCache, ReplayCheck};
use super::store::{build_generator, generate_secret, IdentityStore};

/// Outcome of a code verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Code matched and has been claimed
    Accepted,
    /// Callsign is locked out; no verification was attempted
    RateLimited,
    /// Unknown callsign or wrong code
    Rejected,
    /// Code was valid but has already been used
    Replayed,
}

impl Verification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verification::Accepted)
    }

    /// Line shown to the client
    pub fn message(&self) -> &'static str {
        match self {
            Verification::Accepted => "Authentication successful.",
            Verification::RateLimited => "Too many failed attempts. Try again in 5 minutes.",
            Verification::Rejected => "Invalid callsign or token.",
            Verification::Replayed => "Code already used. Wait for next code.",
        }
    }
}

/// Verifies codes against enrolled callsigns
///
/// The identity store is swapped atomically on reload. Failure and replay
/// state is keyed per callsign so unrelated logins never contend.
pub struct Authenticator {
    store_path: Option<PathBuf>,
    identities: ArcSwap<IdentityStore>,
    failures: FailureLog,
    replay: ReplayCache,
    decoy: Option<TOTP>,
}

impl Authenticator {
    /// Load identities from a store file
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = IdentityStore::load(&path);
        let mut auth = Self::from_store(store);
        auth.store_path = Some(path);
        auth
    }

    /// Use an already-built store; `reload_identities` becomes a no-op
    pub fn from_store(store: IdentityStore) -> Self {
        let decoy = build_generator(&Callsign::from("DECOY"), &generate_secret()).ok();

        Self {
            store_path: None,
            identities: ArcSwap::from_pointee(store),
            failures: FailureLog::new(),
            replay: ReplayCache::new(),
            decoy,
        }
    }

    /// Build from callsign/secret pairs
    pub fn with_secrets<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::from_store(IdentityStore::from_secrets(entries))
    }

    /// Verify a code for a callsign
    ///
    /// Order matters: rate limit, then identity, then replay, then the TOTP
    /// window. Accepts any input shape.
    pub fn verify_code(&self, identity: &str, code: &str) -> Verification {
        let callsign = Callsign::normalize(identity);
        let key = callsign.as_str();
        let now = Instant::now();

        if self.failures.is_limited(key, now) {
            tracing::warn!(callsign = %callsign, "Verification refused: rate limited");
            return Verification::RateLimited;
        }

        let identities = self.identities.load();
        let Some(totp) = identities.get(key) else {
            // Spend the same HMAC work as a real check
            if let Some(decoy) = &self.decoy {
                let _ = decoy.check(code, current_time_secs());
            }
            self.failures.record(key, now);
            tracing::warn!(callsign = %callsign, "Verification failed: unknown callsign");
            return Verification::Rejected;
        };

        let check = self.replay.check_and_claim(key, code, now, || {
            totp.check(code, current_time_secs())
        });

        match check {
            ReplayCheck::Claimed => {
                self.failures.clear(key);
                tracing::info!(callsign = %callsign, "Verification succeeded");
                Verification::Accepted
            }
            ReplayCheck::Replayed => {
                tracing::warn!(callsign = %callsign, "Verification failed: code replayed");
                Verification::Replayed
            }
            ReplayCheck::Invalid => {
                self.failures.record(key, now);
                tracing::warn!(callsign = %callsign, "Verification failed: wrong code");
                Verification::Rejected
            }
        }
    }

    /// Whether the callsign is currently locked out
    pub fn is_rate_limited(&self, identity: &str) -> bool {
        let callsign = Callsign::normalize(identity);
        self.failures.is_limited(callsign.as_str(), Instant::now())
    }

    pub fn record_failure(&self, identity: &str) {
        let callsign = Callsign::normalize(identity);
        self.failures.record(callsign.as_str(), Instant::now());
    }

    pub fn clear_failures(&self, identity: &str) {
        let callsign = Callsign::normalize(identity);
        self.failures.clear(callsign.as_str());
    }

    /// Re-read the store file, returning the number of callsigns loaded
    pub fn reload_identities(&self) -> usize {
        match &self.store_path {
            Some(path) => {
                let store = IdentityStore::load(path);
                let count = store.len();
                self.identities.store(Arc::new(store));
                tracing::info!("Reloaded {} callsigns", count);
                count
            }
            None => self.identity_count(),
        }
    }

    pub fn identity_count(&self) -> usize {
        self.identities.load().len()
    }

    pub fn has_identity(&self, identity: &str) -> bool {
        let callsign = Callsign::normalize(identity);
        self.identities.load().contains(callsign.as_str())
    }

    /// Code currently valid for a callsign
    pub fn current_code(&self, identity: &str) -> Option<String> {
        let callsign = Callsign::normalize(identity);
        self.identities
            .load()
            .get(callsign.as_str())
            .map(|totp| totp.generate(current_time_secs()))
    }

    /// Check a code without touching failure or replay state
    pub fn matches_current_code(&self, identity: &str, code: &str) -> bool {
        let callsign = Callsign::normalize(identity);
        self.identities
            .load()
            .get(callsign.as_str())
            .map(|totp| totp.check(code, current_time_secs()))
            .unwrap_or(false)
    }

    /// Drop aged-out failure and replay entries
    pub fn prune(&self) -> (usize, usize) {
        let now = Instant::now();
        (self.failures.prune(now), self.replay.prune(now))
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("store_path", &self.store_path)
            .field("identities", &self.identity_count())
            .field("failures", &self.failures.len())
            .field("replay", &self.replay.len())
            .finish()
    }
}
