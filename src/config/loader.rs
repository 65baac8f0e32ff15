//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::CallerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CallerConfig, ConfigError> {
    let config: CallerConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CallerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;

    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("caller-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "[http]\nbase_url = \"https://api.test\"\n\n[circuit_breaker]\nfailure_threshold = 2\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.http.base_url.as_deref(), Some("https://api.test"));
        assert_eq!(config.circuit_breaker.failure_threshold, 2);

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().starts_with("Validation failed: retry.max_attempts"));
    }

    #[test]
    fn test_infinite_timeout_rejected() {
        let err = parse_config("[http]\ntimeout = inf\n").unwrap_err();
        assert!(matches!(&err, ConfigError::Validation(errors) if errors[0].field == "http.timeout"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[retry\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
