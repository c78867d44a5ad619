//! Configuration loading from disk.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the listener port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, honoring `PORT`.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ServerConfig = toml::from_str(&content)?;

    apply_env(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides (`PORT`).
pub fn apply_env(config: &mut ServerConfig) -> Result<(), ConfigError> {
    if let Ok(port) = std::env::var(PORT_ENV) {
        let parsed = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        override_port(config, parsed);
    }
    Ok(())
}

/// Replace the port of the listener address, keeping its host.
pub fn override_port(config: &mut ServerConfig, port: u16) {
    let bind = &mut config.listener.bind_address;
    *bind = match bind.parse::<SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => format!("0.0.0.0:{port}"),
    };
    tracing::debug!(bind_address = %bind, "Listener port overridden");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotroute.toml");
        fs::write(&path, "[listener]\nbind_address = \"127.0.0.1:9000\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.listener.bind_address.starts_with("127.0.0.1:"));
    }

    #[test]
    fn reports_parse_and_validation_errors() {
        let dir = tempfile::tempdir().unwrap();

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[listener\n").unwrap();
        assert!(matches!(load_config(&broken), Err(ConfigError::Parse(_))));

        let invalid = dir.path().join("invalid.toml");
        fs::write(&invalid, "[timeouts]\nrequest_secs = 0\n[limits]\nmax_body_size = 0\n").unwrap();
        match load_config(&invalid) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }

        assert!(matches!(
            load_config(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn port_override_keeps_host() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:8080".into();
        override_port(&mut config, 3000);
        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");

        config.listener.bind_address = "garbage".into();
        override_port(&mut config, 3001);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3001");
    }
}
