//! Serve command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use hamgate_core::config::GatewayConfig;
use hamgate_server::app::{install_shutdown_signals, run_gateway};

use crate::output::print_info;

/// Run the gateway in the foreground until Ctrl+C or SIGTERM
pub async fn serve_command(
    mut config: GatewayConfig,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = bind {
        config.network.host = host;
    }
    if let Some(port) = port {
        config.network.port = port;
    }

    print_info(&format!(
        "Starting gateway on {}",
        config.network.bind_address()
    ));

    let cancel = CancellationToken::new();
    install_shutdown_signals(cancel.clone());
    run_gateway(config, cancel).await
}
