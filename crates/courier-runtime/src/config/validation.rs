//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, LogFormat, LogOutput, LoggingConfig, RemoteConfig, ServerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    if let Some(server) = &config.server {
        validate_server_config(server)?;
    }
    validate_remotes_config(&config.remotes)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::invalid(
            "logging.format = \"json\" needs the json-log feature",
        ));
    }

    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::invalid("logging.filters has an empty module name"));
    }

    Ok(())
}

/// Validates the inbound bridge settings.
fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    Ok(())
}

/// Validates all remote configurations.
fn validate_remotes_config(remotes: &[RemoteConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for remote in remotes {
        if remote.address.is_empty() {
            return Err(ConfigError::missing_field("remotes.address"));
        }
        if !seen.insert(remote.address.as_str()) {
            return Err(ConfigError::DuplicateAddress(remote.address.clone()));
        }

        validate_url(&remote.base_url)?;

        if remote.timeout_ms == Some(0) {
            return Err(ConfigError::invalid(format!(
                "Remote '{}' timeout must be greater than 0",
                remote.address
            )));
        }

        if remote.username.is_some() != remote.password.is_some() {
            return Err(ConfigError::invalid(format!(
                "Remote '{}' needs both username and password, or neither",
                remote.address
            )));
        }
    }

    Ok(())
}

/// Validates an HTTP base URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("remotes.base_url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(address: &str) -> RemoteConfig {
        RemoteConfig {
            address: address.to_string(),
            base_url: "http://localhost:7000".to_string(),
            timeout_ms: None,
            username: None,
            password: None,
        }
    }

    #[test]
    fn test_validate_empty_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_duplicate_address() {
        let config = CourierConfig {
            remotes: vec![remote("/peer/"), remote("/peer/")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateAddress(_))
        ));
    }

    #[test]
    fn test_validate_url_scheme() {
        let config = CourierConfig {
            remotes: vec![RemoteConfig {
                base_url: "ws://localhost".to_string(),
                ..remote("/peer/")
            }],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_half_credentials() {
        let config = CourierConfig {
            remotes: vec![RemoteConfig {
                username: Some("node".to_string()),
                ..remote("/peer/")
            }],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_server_allows_ephemeral_port() {
        let mut config = CourierConfig {
            server: Some(ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            }),
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        config.server = Some(ServerConfig {
            host: String::new(),
            port: 0,
        });
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
