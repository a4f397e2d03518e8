//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing lines on the wire
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// I/O error on the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
