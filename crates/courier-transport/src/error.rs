//! Errors raised while setting up transports.
//!
//! Failures of an individual remote call are not transport errors; they
//! travel inside the [`Response`](courier_core::Response) as a
//! [`DispatchError`](courier_core::DispatchError).

use thiserror::Error;

/// Errors that can occur when building or starting a transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The address that failed to bind.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// The base URL of a remote destination is unusable.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Reason for rejection.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for transport setup.
pub type TransportResult<T> = Result<T, TransportError>;

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
