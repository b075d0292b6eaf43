//! Error types for caption-relay
//!
//! Registry inconsistencies (double unregister, re-identification) are not
//! errors: the registry resolves them in place and logs them.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or empty
    #[error("{0}")]
    InvalidInput(String),

    /// A single connection's transport failed
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// I/O failure (bind, accept)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that reaches a caller
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Whether this error was caused by the caller
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}

/// Failure of one connection's transport
///
/// Always isolated to the connection it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The session on the other end of the queue or socket is gone
    #[error("connection closed")]
    Closed,

    /// A write did not complete within its deadline
    #[error("write timed out")]
    Timeout,

    /// The peer sent something we could not make sense of
    #[error("protocol error: {0}")]
    Protocol(String),
}
