//! hamgate-protocol: Line protocol for the hamgate packet-radio gateway
//!
//! This crate defines the CRLF text framing spoken over the telnet-style
//! connection and the compact command grammar operators type at the
//! `> ` prompt.

pub mod codec;
pub mod command;
pub mod error;
pub mod parser;

pub use codec::{LineCodec, Reply, DEFAULT_MAX_LINE_LENGTH};
pub use command::{Command, CommandValue, ParseError};
pub use error::ProtocolError;
pub use parser::parse;
