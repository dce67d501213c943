//! Errors raised while loading or validating a [`CourierConfig`](super::CourierConfig).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// Sources could not be read or did not fit the schema.
    #[error("cannot read configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("`{field}` must be set")]
    MissingField { field: String },

    /// Two remotes registered under one address.
    #[error("address {0} is claimed by more than one remote")]
    DuplicateAddress(String),

    #[error("bad base_url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
