//! hamgate CLI
//!
//! Single binary for operating a hamgate gateway:
//! - Run the gateway in the foreground
//! - Enrol callsigns and inspect their codes
//! - Manage configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hamgate::commands;

#[derive(Parser)]
#[command(name = "hamgate")]
#[command(author, version, about = "TOTP-authenticated packet-radio gateway to Home Assistant")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway in the foreground
    #[command(alias = "start")]
    Serve {
        /// Listen address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a new TOTP secret for a callsign
    Secret {
        /// Operator callsign
        callsign: String,
        /// Issuer shown in the authenticator app
        #[arg(long)]
        issuer: Option<String>,
        /// Store the secret in the identity store
        #[arg(short, long)]
        write: bool,
    },

    /// Print the code currently valid for a callsign
    Code {
        /// Operator callsign
        callsign: String,
    },

    /// Check a code without touching gateway state
    Verify {
        /// Operator callsign
        callsign: String,
        /// Six-digit code
        code: String,
    },

    /// List enrolled callsigns
    Users,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // The gateway logs at info by default
    let log_level = match (&cli.command, cli.quiet, cli.verbose) {
        (Commands::Serve { .. }, false, 0) => "info",
        _ => log_level,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Serve { bind, port } => {
            let config = commands::load_gateway_config(config_path)?;
            commands::serve_command(config, bind, port).await?;
        }

        Commands::Secret {
            callsign,
            issuer,
            write,
        } => {
            let config = commands::load_gateway_config(config_path)?;
            commands::secret_command(&config, &callsign, issuer.as_deref(), write)?;
        }

        Commands::Code { callsign } => {
            let config = commands::load_gateway_config(config_path)?;
            commands::code_command(&config, &callsign)?;
        }

        Commands::Verify { callsign, code } => {
            let config = commands::load_gateway_config(config_path)?;
            commands::verify_command(&config, &callsign, &code)?;
        }

        Commands::Users => {
            let config = commands::load_gateway_config(config_path)?;
            commands::users_command(&config)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Get { key } => commands::config_get(config_path, &key)?,
            ConfigAction::Path => commands::config_path(config_path),
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
        },
    }

    Ok(())
}
