//! Shared gateway state

use std::sync::Arc;

use hamgate_core::config::GatewayConfig;

use crate::auth::Authenticator;
use crate::backend::CommandExecutor;
use crate::server::build_banner;
use crate::session::SessionTable;

/// State shared by every connection
pub struct GatewayState {
    /// Configuration
    pub config: GatewayConfig,
    /// Code verification, rate limiting and replay protection
    pub authenticator: Arc<Authenticator>,
    /// Login sessions
    pub sessions: Arc<SessionTable>,
    /// Backend command execution
    pub executor: Arc<dyn CommandExecutor>,
    /// Pre-rendered banner lines
    pub banner: Vec<String>,
}

impl GatewayState {
    pub fn new(
        config: GatewayConfig,
        authenticator: Arc<Authenticator>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let sessions = Arc::new(SessionTable::new(config.security.session_timeout));
        let banner = build_banner(&config.security.banner_text);

        Self {
            config,
            authenticator,
            sessions,
            executor,
            banner,
        }
    }
}
