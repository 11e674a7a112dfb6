//! Configuration management.
//!
//! Settings load from three layers, lowest to highest priority:
//! 1. Default values embedded in the structs
//! 2. A TOML config file (default `config/mammothbox.toml`)
//! 3. Environment variables (`MAMMOTHBOX__<section>__<key>`, highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mammothbox::config::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("listening on {}", config.server.bind_addr);
//! ```

mod models;
mod sources;
mod validation;

pub use models::{
    CatalogConfig, Config, IngestConfig, MediaConfig, QueueBackendKind, QueueConfig,
    SchemaConfig, ServerConfig, StorageConfig, TelemetryConfig, WorkerSettings,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Loads configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Loads configuration from a specific path. Useful for tests.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[catalog]
database_url = "postgres://localhost/mammothbox_test"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.catalog.database_url, "postgres://localhost/mammothbox_test");
    }

    #[test]
    fn test_validation_catches_inverted_connection_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[catalog]
database_url = "postgres://localhost/mammothbox_test"
min_connections = 50
max_connections = 5
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ConnectionBoundsInverted { .. })
        ));
    }
}
