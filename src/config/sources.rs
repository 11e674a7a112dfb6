use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "MAMMOTHBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mammothbox.toml";
const ENV_PREFIX: &str = "MAMMOTHBOX";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from a `.env` file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path. Useful for testing with custom
/// configuration files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // MAMMOTHBOX__CATALOG__DATABASE_URL -> catalog.database_url
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.worker.num_workers, 4);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[catalog]
database_url = "postgres://localhost/test_db"
max_connections = 5

[worker]
num_workers = 8
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.catalog.database_url, "postgres://localhost/test_db");
        assert_eq!(config.catalog.max_connections, 5);
        assert_eq!(config.worker.num_workers, 8);
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"

[catalog]
database_url = "postgres://localhost/mammothbox"

[queue]
backend = "distributed"
default_max_retries = 5

[schema]
sample_size = 256
stability_threshold = 0.7
auto_migrate = true

[media]
embedding_dim = 256
default_cluster_threshold = 0.9

[telemetry]
metrics_addr = "0.0.0.0:9090"
otlp_endpoint = "http://otel-collector:4317"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();

        assert_eq!(config.catalog.database_url, "postgres://localhost/mammothbox");
        assert_eq!(config.queue.backend, super::super::models::QueueBackendKind::Distributed);
        assert_eq!(config.queue.default_max_retries, 5);
        assert_eq!(config.schema.sample_size, 256);
        assert!(config.schema.auto_migrate);
        assert_eq!(config.media.embedding_dim, 256);
        assert!(config.telemetry.otlp_endpoint.is_some());
    }
}
