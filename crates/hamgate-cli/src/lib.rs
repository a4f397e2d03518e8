//! hamgate-cli: Operator tooling for hamgate
//!
//! Provides the `hamgate` binary for running the gateway, enrolling
//! callsigns and managing configuration.

pub mod commands;
pub mod output;
