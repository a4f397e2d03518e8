//! Per-callsign failure log for login rate limiting

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Rolling window in which failures count toward a lockout
pub const FAILURE_WINDOW: Duration = Duration::from_secs(300);

/// Failures within the window that lock a callsign out
pub const MAX_FAILURES: usize = 5;

/// Timestamps of recent failed verifications, keyed by callsign
///
/// Each callsign's list sits behind its own map shard, so verifying one
/// callsign never waits on another.
#[derive(Debug)]
pub struct FailureLog {
    entries: DashMap<String, VecDeque<Instant>>,
    window: Duration,
    threshold: usize,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::with_limits(FAILURE_WINDOW, MAX_FAILURES)
    }

    pub fn with_limits(window: Duration, threshold: usize) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            threshold,
        }
    }

    /// Whether the callsign has reached the failure threshold
    pub fn is_limited(&self, callsign: &str, now: Instant) -> bool {
        match self.entries.get_mut(callsign) {
            Some(mut failures) => {
                purge(&mut failures, now, self.window);
                failures.len() >= self.threshold
            }
            None => false,
        }
    }

    /// Record one failure at `now`
    pub fn record(&self, callsign: &str, now: Instant) {
        let mut failures = self.entries.entry(callsign.to_string()).or_default();
        purge(&mut failures, now, self.window);
        failures.push_back(now);
    }

    /// Forget all failures for the callsign
    pub fn clear(&self, callsign: &str) {
        self.entries.remove(callsign);
    }

    /// Failures currently inside the window
    pub fn count(&self, callsign: &str, now: Instant) -> usize {
        match self.entries.get_mut(callsign) {
            Some(mut failures) => {
                purge(&mut failures, now, self.window);
                failures.len()
            }
            None => 0,
        }
    }

    /// Drop callsigns whose failures have all aged out
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, failures| {
            purge(failures, now, self.window);
            !failures.is_empty()
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

impl Default for FailureLog {
    fn default() -> Self {
        Self::new()
    }
}

fn purge(failures: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = failures.front() {
        if now.duration_since(*oldest) >= window {
            failures.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let log = FailureLog::new();
        let now = Instant::now();

        for _ in 0..MAX_FAILURES - 1 {
            log.record("KN4XYZ", now);
        }
        assert!(!log.is_limited("KN4XYZ", now));

        log.record("KN4XYZ", now);
        assert!(log.is_limited("KN4XYZ", now));
        assert!(!log.is_limited("W1AW", now));
    }

    #[test]
    fn test_old_failures_age_out() {
        let log = FailureLog::new();
        let start = Instant::now();

        for _ in 0..MAX_FAILURES {
            log.record("KN4XYZ", start);
        }
        assert!(log.is_limited("KN4XYZ", start));

        let later = start + FAILURE_WINDOW + Duration::from_secs(1);
        assert!(!log.is_limited("KN4XYZ", later));
        assert_eq!(log.count("KN4XYZ", later), 0);
    }

    #[test]
    fn test_clear() {
        let log = FailureLog::new();
        let now = Instant::now();

        log.record("KN4XYZ", now);
        log.clear("KN4XYZ");
        assert_eq!(log.count("KN4XYZ", now), 0);
    }

    #[test]
    fn test_prune() {
        let log = FailureLog::new();
        let start = Instant::now();

        log.record("OLD", start);
        log.record("NEW", start + Duration::from_secs(200));

        let removed = log.prune(start + Duration::from_secs(310));
        assert_eq!(removed, 1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.count("NEW", start + Duration::from_secs(310)), 1);
    }
}
