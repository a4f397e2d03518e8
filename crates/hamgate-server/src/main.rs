//! hamgate gateway daemon
//!
//! Listens for telnet-style connections from packet nodes and relays
//! authenticated operator commands to Home Assistant.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hamgate_core::config::{self, GatewayConfig};
use hamgate_server::app::{install_shutdown_signals, run_gateway};

#[derive(Parser)]
#[command(name = "hamgate-server")]
#[command(about = "hamgate packet-radio gateway daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Home Assistant token (overrides config)
    #[arg(long, env = "HAMGATE_BACKEND_TOKEN", hide_env_values = true)]
    backend_token: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("hamgate {} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = if let Some(config_path) = &args.config {
        config::load_gateway_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_gateway_config(&default_path)
                .with_context(|| format!("Failed to load config from {:?}", default_path))?
        } else {
            tracing::info!("Using default configuration");
            GatewayConfig::default()
        }
    };

    if let Some(host) = args.bind {
        config.network.host = host;
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(token) = args.backend_token {
        config.backend.token = token;
    }

    let cancel = CancellationToken::new();
    install_shutdown_signals(cancel.clone());

    run_gateway(config, cancel).await
}
