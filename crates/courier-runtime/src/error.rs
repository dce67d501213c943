//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transport could not be set up.
    #[error("Transport error: {0}")]
    Transport(#[from] courier_transport::TransportError),

    /// A configured feature is not compiled in.
    #[error("Feature '{0}' is not enabled")]
    FeatureDisabled(&'static str),

    /// Listening for shutdown signals failed.
    #[error("Signal handling failed: {0}")]
    Signal(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
