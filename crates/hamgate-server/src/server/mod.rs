//! Telnet-style line server

mod allowlist;
mod banner;
mod handler;
mod listener;
mod registry;

pub use allowlist::IpAllowlist;
pub use banner::build_banner;
pub use handler::{ConnectionHandler, CREDENTIAL_TIMEOUT, MAX_MALFORMED_CODES};
pub use listener::{Listener, ListenerStats};
pub use registry::{
    ConnectionGuard, ConnectionId, ConnectionRegistry, ConnectionSnapshot, ConnectionStatus,
};
