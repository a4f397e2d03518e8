//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use hamgate_core::config::{self, GatewayConfig};

/// Config file in use: `--config` if given, else the default location
pub fn config_file(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(config::default_config_path)
}

/// Load the gateway configuration
///
/// An explicit `--config` must exist. Without one, a missing default file
/// means built-in defaults.
pub fn load_gateway_config(config_path: Option<&PathBuf>) -> Result<GatewayConfig> {
    let path = config_file(config_path);

    if config_path.is_none() && !path.exists() {
        tracing::info!("Using default configuration");
        return Ok(GatewayConfig::default());
    }

    config::load_gateway_config(&path)
        .with_context(|| format!("Failed to load config from {:?}", path))
}

/// Get a config value by dotted key
pub fn config_get(config_path: Option<&PathBuf>, key: &str) -> Result<()> {
    let path = config_file(config_path);

    if !path.exists() {
        print_error(&format!("Config file not found: {:?}", path));
        print_info("Run 'hamgate config init' to create one");
        anyhow::bail!("no config file");
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let table: toml::Table =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    let Some(value) = lookup(&table, key) else {
        print_error(&format!("Key not found: {}", key));
        anyhow::bail!("unknown key {}", key);
    };

    match value {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Integer(i) => println!("{}", i),
        toml::Value::Float(f) => println!("{}", f),
        toml::Value::Boolean(b) => println!("{}", b),
        toml::Value::Array(a) => {
            for item in a {
                println!("{}", item);
            }
        }
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(value)?),
        toml::Value::Datetime(d) => println!("{}", d),
    }

    Ok(())
}

fn lookup<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let mut parts = key.split('.');
    let mut current = table.get(parts.next()?)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Show the current configuration file
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = config_file(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'hamgate config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Print the configuration file path
pub fn config_path(config_path: Option<&PathBuf>) {
    println!("{}", config_file(config_path).display());
}

/// Write a commented default configuration
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = config_file(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        anyhow::bail!("config file already exists");
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            print_success(&format!("Created config directory: {:?}", dir));
        }
    }

    std::fs::write(&path, default_config())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));

    print_enrolment_hint(&path);
    Ok(())
}

fn print_enrolment_hint(config_file: &Path) {
    let users = config_file
        .parent()
        .map(|dir| dir.join("users.toml"))
        .unwrap_or_else(|| PathBuf::from("users.toml"));

    if !users.exists() {
        print_info("Enrol an operator with:");
        print_info("  hamgate secret <CALLSIGN> --write");
    }
}

fn default_config() -> String {
    r#"# hamgate configuration

[network]
# Address and port for the telnet-style listener
host = "0.0.0.0"
port = 8023

# Maximum simultaneous connections
max_connections = 10

# Seconds the command prompt waits before disconnecting
idle_timeout_seconds = 300

# Expect the callsign as the first line, unprompted (BPQ node behaviour)
legacy_mode = true

# Longer inbound lines are truncated
max_line_length = 1024

[security]
# Login attempts per connection
max_login_attempts = 3

# Shown in a box on connect; empty disables the banner
banner_text = "HamGate"

# Addresses or CIDR prefixes allowed to connect; empty allows all
ip_allowlist = []

# Inactivity before a login session expires
session_timeout_seconds = 1800

[identities]
# Callsign secrets; relative to this file
path = "users.toml"

[backend]
# Home Assistant base URL; leave empty to disable device commands
url = ""

# Long-lived access token (or set HAMGATE_BACKEND_TOKEN)
token = ""

request_timeout_seconds = 10
cache_ttl_seconds = 60
page_size = 10

# Domains to expose; empty exposes all
include_domains = []

# Entity id glob patterns to hide
exclude_entities = []
"#
    .to_string()
}
