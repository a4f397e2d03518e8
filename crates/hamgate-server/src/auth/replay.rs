//! Replay cache of recently accepted codes

use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// How long an accepted code is remembered
///
/// Matches the drift tolerance: a code cannot be accepted again while the
/// clock window would still consider it valid.
pub const REPLAY_WINDOW: Duration = Duration::from_secs(90);

/// Result of checking a code against the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayCheck {
    /// The code verified and is now claimed
    Claimed,
    /// The code was already used inside the window
    Replayed,
    /// The code did not verify
    Invalid,
}

/// Accepted codes per callsign with their expiry
#[derive(Debug)]
pub struct ReplayCache {
    entries: DashMap<String, HashMap<String, Instant>>,
    window: Duration,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::with_window(REPLAY_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    /// Check `code` for replay, verify it, and claim it if it verifies
    ///
    /// The callsign's entry stays locked from the replay check through the
    /// insert, so two connections racing with the same code cannot both
    /// succeed.
    pub fn check_and_claim<F>(&self, callsign: &str, code: &str, now: Instant, verify: F) -> ReplayCheck
    where
        F: FnOnce() -> bool,
    {
        let mut used = self.entries.entry(callsign.to_string()).or_default();
        used.retain(|_, expires| *expires > now);

        if used.contains_key(code) {
            return ReplayCheck::Replayed;
        }

        if !verify() {
            return ReplayCheck::Invalid;
        }

        used.insert(code.to_string(), now + self.window);
        ReplayCheck::Claimed
    }

    /// Whether `code` is currently remembered for the callsign
    pub fn contains(&self, callsign: &str, code: &str, now: Instant) -> bool {
        self.entries
            .get(callsign)
            .and_then(|used| used.get(code).map(|expires| *expires > now))
            .unwrap_or(false)
    }

    /// Drop expired codes and callsigns with none left
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, used| {
            used.retain(|_, expires| *expires > now);
            !used.is_empty()
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new()
    }
}
