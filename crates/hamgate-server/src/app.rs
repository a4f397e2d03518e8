//! Gateway assembly and lifecycle
//!
//! Wires configuration, the authenticator, the backend executor and the
//! listener together, and runs them until the cancellation token fires.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use hamgate_core::config::{BackendConfig, GatewayConfig};
use hamgate_core::time::format_duration;

use crate::auth::Authenticator;
use crate::backend::{CommandExecutor, HomeAssistantExecutor, NullExecutor};
use crate::server::Listener;
use crate::session::run_housekeeping;
use crate::state::GatewayState;

/// Build the command executor for the configured backend
///
/// Falls back to [`NullExecutor`] when no backend URL is set or the HTTP
/// client cannot be built, so the gateway still accepts logins.
pub fn build_executor(config: &BackendConfig) -> Arc<dyn CommandExecutor> {
    if !config.is_configured() {
        tracing::warn!("No backend URL configured, device commands are disabled");
        return Arc::new(NullExecutor);
    }

    match HomeAssistantExecutor::from_config(config) {
        Ok(executor) => {
            tracing::info!("Using Home Assistant at {}", executor.client().base_url());
            Arc::new(executor)
        }
        Err(e) => {
            tracing::error!("Failed to set up Home Assistant client: {}", e);
            Arc::new(NullExecutor)
        }
    }
}

/// Run the gateway until `cancel` fires
pub async fn run_gateway(config: GatewayConfig, cancel: CancellationToken) -> Result<()> {
    let authenticator = Arc::new(Authenticator::load(&config.identities.path));
    if authenticator.identity_count() == 0 {
        tracing::warn!(
            "No identities loaded from {:?}, every login will be rejected",
            config.identities.path
        );
    } else {
        tracing::info!("Loaded {} identities", authenticator.identity_count());
    }

    let executor = build_executor(&config.backend);
    let state = Arc::new(GatewayState::new(config, authenticator, executor));

    let listener = Listener::new(Arc::clone(&state), cancel.clone());
    let socket = listener.bind().await.context("Failed to start listener")?;

    let housekeeping = tokio::spawn(run_housekeeping(
        Arc::clone(&state.sessions),
        Arc::clone(&state.authenticator),
        cancel.child_token(),
    ));

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(
        Arc::clone(&state.authenticator),
        cancel.clone(),
    ));

    let served = listener.serve(socket).await;
    listener.shutdown().await;

    let stats = listener.stats();
    tracing::info!(
        "Served {} connection(s) over {}",
        stats.total_connections,
        format_duration(stats.uptime.unwrap_or_default().as_secs())
    );

    cancel.cancel();
    if let Err(e) = housekeeping.await {
        tracing::warn!("Housekeeping task failed: {}", e);
    }

    served.context("Listener failed")?;
    tracing::info!("Gateway shutdown complete");
    Ok(())
}

/// Re-read the identity store on SIGHUP
#[cfg(unix)]
async fn reload_on_hangup(authenticator: Arc<Authenticator>, cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::warn!("Failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                let count = authenticator.reload_identities();
                tracing::info!("Reloaded identities on SIGHUP ({} loaded)", count);
            }
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
pub fn install_shutdown_signals(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    terminate.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });
}
