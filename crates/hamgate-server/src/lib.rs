//! hamgate-server: TOTP-authenticated text gateway to Home Assistant
//!
//! The daemon accepts plain TCP connections from packet-radio nodes and
//! terminal programs, authenticates operators by callsign and one-time code,
//! and translates a compact command language into Home Assistant REST calls.
//! Every command that changes device state needs a fresh code.

pub mod app;
pub mod auth;
pub mod backend;
pub mod server;
pub mod session;
pub mod state;

pub use app::run_gateway;
pub use state::GatewayState;
