//! CLI command implementations

mod config;
mod identity;
mod serve;

pub use config::{config_get, config_init, config_path, config_show, load_gateway_config};
pub use identity::{code_command, secret_command, users_command, verify_command};
pub use serve::serve_command;
