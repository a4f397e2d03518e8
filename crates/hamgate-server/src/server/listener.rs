//! TCP listener
//!
//! Accepts connections, applies admission control and spawns a
//! [`ConnectionHandler`] for each admitted client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use hamgate_core::GatewayError;

use crate::server::allowlist::IpAllowlist;
use crate::server::handler::ConnectionHandler;
use crate::server::registry::{ConnectionRegistry, ConnectionSnapshot};
use crate::state::GatewayState;

/// Pause after a failed accept so a persistent error does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Longest a rejection notice may take to write
const REJECT_TIMEOUT: Duration = Duration::from_secs(5);

const NOT_ALLOWED: &str = "ERR: Connection not allowed from this address.\r\n";
const AT_CAPACITY: &str = "ERR: Connection limit reached. Try again later.\r\n";

/// Point-in-time listener statistics
#[derive(Debug, Clone, Serialize)]
pub struct ListenerStats {
    pub active_connections: usize,
    pub max_connections: usize,
    pub total_connections: u64,
    #[serde(rename = "uptime_seconds", serialize_with = "serialize_uptime")]
    pub uptime: Option<Duration>,
    pub listening: bool,
    pub connections: Vec<ConnectionSnapshot>,
}

fn serialize_uptime<S>(uptime: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match uptime {
        Some(uptime) => serializer.serialize_some(&uptime.as_secs()),
        None => serializer.serialize_none(),
    }
}

/// Gateway listener
pub struct Listener {
    state: Arc<GatewayState>,
    allowlist: IpAllowlist,
    registry: Arc<ConnectionRegistry>,
    /// Cancelled to stop accepting and to close every connection
    shutdown: CancellationToken,
    tracker: TaskTracker,
    started_at: OnceLock<Instant>,
    listening: AtomicBool,
}

impl Listener {
    pub fn new(state: Arc<GatewayState>, shutdown: CancellationToken) -> Self {
        let allowlist = IpAllowlist::parse(&state.config.security.ip_allowlist);

        Self {
            state,
            allowlist,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown,
            tracker: TaskTracker::new(),
            started_at: OnceLock::new(),
            listening: AtomicBool::new(false),
        }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.state.config.network.bind_address();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })
    }

    /// Accept connections until shutdown is requested
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let local_addr = listener.local_addr()?;
        let _ = self.started_at.set(Instant::now());
        self.listening.store(true, Ordering::SeqCst);

        tracing::info!(
            "Listening on {} (max {} connections, {} identities)",
            local_addr,
            self.state.config.network.max_connections,
            self.state.authenticator.identity_count()
        );
        if self.allowlist.is_restricted() {
            tracing::info!(
                "Accepting connections from {} network(s) only",
                self.allowlist.networks().len()
            );
        }

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::info!("Listener shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer)) => self.admit(socket, peer),
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        self.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Admission control, then hand the socket to a handler task
    fn admit(&self, socket: TcpStream, peer: SocketAddr) {
        if !self.allowlist.allows(peer.ip()) {
            tracing::warn!(peer = %peer, "Connection rejected: address not allowed");
            self.reject(socket, NOT_ALLOWED);
            return;
        }

        let max_connections = self.state.config.network.max_connections;
        if self.registry.len() >= max_connections {
            tracing::warn!(
                peer = %peer,
                "Connection rejected: limit of {} reached",
                max_connections
            );
            self.reject(socket, AT_CAPACITY);
            return;
        }

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(peer = %peer, "Failed to set TCP_NODELAY: {}", e);
        }

        let guard = self.registry.register(peer);
        let handler = ConnectionHandler::new(
            socket,
            Arc::clone(&self.state),
            Arc::clone(guard.status()),
            self.shutdown.child_token(),
        );

        self.tracker.spawn(async move {
            let _guard = guard;
            handler.run().await;
        });
    }

    /// Send a one-line notice and close, without blocking the accept loop
    fn reject(&self, mut socket: TcpStream, notice: &'static str) {
        self.tracker.spawn(async move {
            let write = async {
                socket.write_all(notice.as_bytes()).await?;
                socket.shutdown().await
            };
            if let Err(e) = tokio::time::timeout(REJECT_TIMEOUT, write)
                .await
                .unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into()))
            {
                tracing::debug!("Failed to send rejection notice: {}", e);
            }
        });
    }

    /// Stop accepting, close every connection and wait for handlers to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();

        let pending = self.registry.len();
        if pending > 0 {
            tracing::info!("Closing {} active connection(s)", pending);
        }
        self.tracker.wait().await;
        tracing::info!("All connections closed");
    }

    pub fn stats(&self) -> ListenerStats {
        ListenerStats {
            active_connections: self.registry.len(),
            max_connections: self.state.config.network.max_connections,
            total_connections: self.registry.total_accepted(),
            uptime: self.started_at.get().map(|started| started.elapsed()),
            listening: self.listening.load(Ordering::SeqCst),
            connections: self.registry.snapshot(),
        }
    }

    /// Callsigns of logged-in connections
    pub fn active_callsigns(&self) -> Vec<String> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(|c| c.authenticated)
            .filter_map(|c| c.callsign)
            .collect()
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }
}
