//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let config: GuardConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [backend]
            name = "erp"
            base_url = "http://127.0.0.1:7000"

            [circuit_breaker]
            failure_threshold = 3
            success_threshold = 1
            reset_timeout_ms = 1000

            [retries]
            max_retries = 2
            retryable_statuses = [503]
            retryable_errors = ["ECONNRESET"]

            [health_check]
            interval_secs = 5
            path = "/ping"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.name, "erp");
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.timeout_ms, 10_000);
        assert_eq!(config.retries.retryable_statuses.len(), 1);
        assert_eq!(config.health_check.path, "/ping");
    }

    #[test]
    fn test_validation_failure_lists_errors() {
        let err = parse_config(
            r#"
            [circuit_breaker]
            failure_threshold = 0
            success_threshold = 0
            "#,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Validation failed"));
        assert!(message.contains("failure_threshold"));
        assert!(message.contains("success_threshold"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/guard.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
