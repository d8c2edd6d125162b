//! Unified error handling for snatchd.
//!
//! Session-level errors live here; database errors stay in `db` next to
//! sqlx, and push errors next to the download-client drivers.

use thiserror::Error;

/// Errors that end an IRC session or a connection attempt.
///
/// All of these are recoverable at the handler level: the run loop logs
/// them, applies backoff, and reconnects.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] snatch_proto::ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect timed out after {0} seconds")]
    ConnectTimeout(u64),

    #[error("server closed the link: {0}")]
    ServerClosed(String),

    #[error("registration timed out")]
    RegistrationTimeout,

    #[error("nickserv identify failed: {0}")]
    AuthFailure(String),
}

impl HandlerError {
    /// Get a static error code string for metrics and log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol_error",
            Self::Io(_) => "io_error",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::ServerClosed(_) => "server_closed",
            Self::RegistrationTimeout => "registration_timeout",
            Self::AuthFailure(_) => "auth_failure",
        }
    }
}

/// Errors surfaced to API callers by the supervisor.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration violates an invariant; nothing was changed.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Another enabled network already claims the same (server, account).
    #[error("network conflict: {0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Db(#[from] crate::db::DbError),
}
