//! Live connection registry

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use hamgate_core::{Callsign, ConnectionState};

/// Identifier of an accepted connection, unique for the process lifetime
pub type ConnectionId = u64;

/// Shared view of one live connection, updated by its handler
#[derive(Debug)]
pub struct ConnectionStatus {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub connected_at: Instant,
    inner: Mutex<StatusInner>,
}

#[derive(Debug)]
struct StatusInner {
    state: ConnectionState,
    callsign: Option<Callsign>,
    last_activity: Instant,
}

impl ConnectionStatus {
    fn new(id: ConnectionId, peer: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer,
            connected_at: now,
            inner: Mutex::new(StatusInner {
                state: ConnectionState::Connected,
                callsign: None,
                last_activity: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.lock().state = state;
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn set_callsign(&self, callsign: Callsign) {
        self.lock().callsign = Some(callsign);
    }

    pub fn callsign(&self) -> Option<Callsign> {
        self.lock().callsign.clone()
    }

    /// Record inbound activity
    pub fn touch(&self) {
        self.lock().last_activity = Instant::now();
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let inner = self.lock();
        ConnectionSnapshot {
            id: self.id,
            callsign: inner.callsign.as_ref().map(ToString::to_string),
            remote_addr: self.peer.to_string(),
            authenticated: inner.state.is_authenticated(),
            state: inner.state,
            idle_seconds: Instant::now()
                .saturating_duration_since(inner.last_activity)
                .as_secs(),
        }
    }
}

/// Point-in-time view of a connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub callsign: Option<String>,
    pub remote_addr: String,
    pub authenticated: bool,
    pub state: ConnectionState,
    pub idle_seconds: u64,
}

/// Set of live connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionStatus>>,
    next_id: AtomicU64,
    total_accepted: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; it is removed when the guard drops
    pub fn register(self: &Arc<Self>, peer: SocketAddr) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let status = Arc::new(ConnectionStatus::new(id, peer));

        self.connections.insert(id, Arc::clone(&status));
        self.total_accepted.fetch_add(1, Ordering::Relaxed);

        ConnectionGuard {
            registry: Arc::clone(self),
            status,
        }
    }

    /// Live connection count
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections ever admitted
    pub fn total_accepted(&self) -> u64 {
        self.total_accepted.load(Ordering::Relaxed)
    }

    /// Snapshots of all live connections, ordered by id
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        let mut snapshots: Vec<ConnectionSnapshot> =
            self.connections.iter().map(|c| c.snapshot()).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }
}

/// Keeps a connection registered for as long as it lives
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    status: Arc<ConnectionStatus>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.status.id
    }

    pub fn status(&self) -> &Arc<ConnectionStatus> {
        &self.status
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.connections.remove(&self.status.id);
        tracing::trace!(conn = self.status.id, "Connection deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_guard_deregisters_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());

        let first = registry.register(peer());
        let second = registry.register(peer());
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);

        drop(first);
        assert_eq!(registry.len(), 1);
        drop(second);
        assert!(registry.is_empty());
        assert_eq!(registry.total_accepted(), 2);
    }

    #[test]
    fn test_guard_dropped_during_panic() {
        let registry = Arc::new(ConnectionRegistry::new());
        let cloned = Arc::clone(&registry);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.register(peer());
            panic!("handler fault");
        }));

        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reflects_status() {
        let registry = Arc::new(ConnectionRegistry::new());
        let guard = registry.register(peer());

        guard.status().set_callsign(Callsign::from("kn4xyz"));
        guard.status().set_state(ConnectionState::Authenticated);
        tokio::time::advance(std::time::Duration::from_secs(7)).await;

        let snapshots = registry.snapshot();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].callsign.as_deref(), Some("KN4XYZ"));
        assert!(snapshots[0].authenticated);
        assert_eq!(snapshots[0].idle_seconds, 7);
        assert_eq!(snapshots[0].remote_addr, "127.0.0.1:40000");
    }
}
