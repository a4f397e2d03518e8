//! Periodic housekeeping task
//!
//! Expired sessions are removed lazily on lookup, but a connection that
//! never returns to the prompt would otherwise keep its session forever.
//! This task sweeps the session table and prunes aged-out authenticator
//! state on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::session::SessionTable;

/// Interval between housekeeping passes.
pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(10);

/// Run housekeeping until cancelled.
pub async fn run_housekeeping(
    sessions: Arc<SessionTable>,
    authenticator: Arc<Authenticator>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);

    tracing::info!(
        "Starting housekeeping task (session timeout: {:?}, interval: {:?})",
        sessions.timeout(),
        HOUSEKEEPING_INTERVAL
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                housekeeping_pass(&sessions, &authenticator);
            }
            _ = cancel.cancelled() => {
                tracing::info!("Housekeeping task shutting down");
                break;
            }
        }
    }
}

fn housekeeping_pass(sessions: &SessionTable, authenticator: &Authenticator) {
    let expired = sessions.sweep();
    let (failures, replays) = authenticator.prune();

    tracing::debug!(
        sessions = sessions.len(),
        expired,
        pruned_failures = failures,
        pruned_replays = replays,
        "Housekeeping pass"
    );
}
