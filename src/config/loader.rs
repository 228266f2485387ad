//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let raw = r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [control]
            bind_address = "127.0.0.1:8090"
            ping_delay_secs = 10

            [[endpoints]]
            name = "blog"
            root = "example.com/blog/"
            strip_headers = ["Cookie"]
            body_size_limit = 1048576

            [debug]
            networks = ["127.0.0.0/8"]
        "#;
        let config: ProxyConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.control.ping_delay_secs, 10);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].name, "blog");
        assert_eq!(config.endpoints[0].body_size_limit, 1_048_576);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.control.ping_delay_secs, 30);
        assert!(config.endpoints.is_empty());
        assert!(config.debug.enabled);
    }
}
