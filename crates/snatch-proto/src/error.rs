//! Error types for protocol parsing and transport.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing, parsing, or transporting IRC messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line too long: {actual} bytes exceeds limit of {limit}")]
    MessageTooLong { actual: usize, limit: usize },

    #[error("invalid message: {string:?}: {reason}")]
    InvalidMessage { string: String, reason: String },

    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),
}
