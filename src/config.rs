//! Configuration parsing and structures

use std::path::PathBuf;

use serde::Deserialize;

/// Default read chunk size (4 MiB) for streaming reads
fn default_chunk_size() -> u64 {
    4 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level adapter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Default storage endpoint (MGM address), used when callers pass
    /// the "default" endpoint alias
    pub endpoint: String,

    /// Namespace root prepended to every caller-supplied path
    #[serde(default)]
    pub home_path: String,

    /// Chunk size in bytes for streaming reads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StorageConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.clone(), e.to_string()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: StorageConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "Storage endpoint cannot be empty".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "Chunk size must be non-zero".to_string(),
            ));
        }
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Level filter for the embedding process to initialize its tracing
    /// subscriber with. The adapter only emits events and never installs
    /// a subscriber of its own.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
endpoint: "https://eosmgm.example.org:8443"
home_path: /eos/wopi
chunk_size: 1048576

logging:
  level: debug
"#;
        let config = StorageConfig::from_str(yaml).unwrap();
        assert_eq!(config.endpoint, "https://eosmgm.example.org:8443");
        assert_eq!(config.home_path, "/eos/wopi");
        assert_eq!(config.chunk_size, 1048576);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
endpoint: "https://eosmgm.example.org:8443"
"#;
        let config = StorageConfig::from_str(yaml).unwrap();
        assert_eq!(config.home_path, "");
        assert_eq!(config.chunk_size, 4 * 1024 * 1024);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_missing_endpoint_fails() {
        let result = StorageConfig::from_str("home_path: /eos/wopi\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = StorageConfig::from_str("endpoint: \"\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let yaml = r#"
endpoint: "https://eosmgm.example.org:8443"
logging:
  level: verbose
"#;
        let result = StorageConfig::from_str(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let yaml = r#"
endpoint: "https://eosmgm.example.org:8443"
chunk_size: 0
"#;
        let result = StorageConfig::from_str(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
