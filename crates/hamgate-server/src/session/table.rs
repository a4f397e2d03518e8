//! Login session table

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use hamgate_core::{Callsign, SessionId};

/// A logged-in operator
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub callsign: Callsign,
    pub authenticated_at: Instant,
    pub last_activity: Instant,
}

impl Session {
    /// Time since the last activity
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.idle(now) > timeout
    }

    pub fn info(&self, now: Instant) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.short().to_string(),
            callsign: self.callsign.to_string(),
            age_seconds: now.saturating_duration_since(self.authenticated_at).as_secs(),
            idle_seconds: self.idle(now).as_secs(),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub callsign: String,
    pub age_seconds: u64,
    pub idle_seconds: u64,
}

/// All live login sessions, expiring after a period of inactivity
#[derive(Debug)]
pub struct SessionTable {
    sessions: DashMap<SessionId, Session>,
    timeout: Duration,
}

impl SessionTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout,
        }
    }

    /// Start a session for a freshly authenticated callsign
    pub fn create_session(&self, callsign: &Callsign) -> SessionId {
        let now = Instant::now();

        loop {
            let session_id = SessionId::generate();
            if let Entry::Vacant(entry) = self.sessions.entry(session_id.clone()) {
                entry.insert(Session {
                    session_id: session_id.clone(),
                    callsign: callsign.clone(),
                    authenticated_at: now,
                    last_activity: now,
                });
                tracing::debug!(callsign = %callsign, session = %session_id.short(), "Session created");
                return session_id;
            }
        }
    }

    /// Look up a session, refreshing its activity time
    ///
    /// An expired session is removed and `None` returned.
    pub fn get_session(&self, session_id: &SessionId) -> Option<Session> {
        let now = Instant::now();

        {
            let mut session = self.sessions.get_mut(session_id)?;
            if !session.is_expired(now, self.timeout) {
                session.last_activity = now;
                return Some(session.clone());
            }
        }

        let timeout = self.timeout;
        if self
            .sessions
            .remove_if(session_id, |_, s| s.is_expired(now, timeout))
            .is_some()
        {
            tracing::info!(session = %session_id.short(), "Session expired");
        }
        None
    }

    /// Whether a session is live, without counting this as activity
    ///
    /// An expired session is removed.
    pub fn is_active(&self, session_id: &SessionId) -> bool {
        let now = Instant::now();
        let timeout = self.timeout;

        match self.sessions.get(session_id) {
            Some(session) if !session.is_expired(now, timeout) => return true,
            Some(_) => {}
            None => return false,
        }

        if self
            .sessions
            .remove_if(session_id, |_, s| s.is_expired(now, timeout))
            .is_some()
        {
            tracing::info!(session = %session_id.short(), "Session expired");
        }
        false
    }

    /// Refresh a session's activity time without returning it
    pub fn touch(&self, session_id: &SessionId) -> bool {
        self.get_session(session_id).is_some()
    }

    /// Remove a session; absent ids are ignored
    pub fn end_session(&self, session_id: &SessionId) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            tracing::debug!(callsign = %session.callsign, session = %session_id.short(), "Session ended");
        }
    }

    /// Remove every session idle past the timeout
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now, self.timeout));
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            tracing::info!("Swept {} expired sessions", removed);
        }
        removed
    }

    /// Snapshot of live sessions, sweeping first
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sweep();
        let now = Instant::now();
        let mut sessions: Vec<SessionInfo> = self.sessions.iter().map(|s| s.info(now)).collect();
        sessions.sort_by(|a, b| a.callsign.cmp(&b.callsign));
        sessions
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
