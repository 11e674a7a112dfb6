use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("catalog.database_url must not be empty")]
    EmptyDatabaseUrl,

    #[error("catalog.min_connections ({min}) must not exceed catalog.max_connections ({max})")]
    ConnectionBoundsInverted { min: u32, max: u32 },

    #[error("worker.num_workers must be at least 1")]
    NoWorkers,

    #[error("schema.stability_threshold must be between 0.0 and 1.0, got {0}")]
    InvalidStabilityThreshold(f64),

    #[error("schema.max_top_level_keys must be at least 1")]
    InvalidMaxTopLevelKeys,

    #[error("schema.max_depth must be at least 1")]
    InvalidMaxDepth,

    #[error("media.default_cluster_threshold must be between 0.0 and 1.0, got {0}")]
    InvalidClusterThreshold(f64),

    #[error("media.embedding_dim must be at least 1")]
    InvalidEmbeddingDim,

    #[error("queue.default_max_retries must not be negative")]
    NegativeMaxRetries,
}

/// Validates the entire configuration.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_catalog(config)?;
    validate_worker(config)?;
    validate_schema(config)?;
    validate_media(config)?;
    validate_queue(config)?;
    Ok(())
}

fn validate_catalog(config: &Config) -> Result<(), ValidationError> {
    if config.catalog.database_url.trim().is_empty() {
        return Err(ValidationError::EmptyDatabaseUrl);
    }
    if config.catalog.min_connections > config.catalog.max_connections {
        return Err(ValidationError::ConnectionBoundsInverted {
            min: config.catalog.min_connections,
            max: config.catalog.max_connections,
        });
    }
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.num_workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    Ok(())
}

fn validate_schema(config: &Config) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&config.schema.stability_threshold) {
        return Err(ValidationError::InvalidStabilityThreshold(config.schema.stability_threshold));
    }
    if config.schema.max_top_level_keys == 0 {
        return Err(ValidationError::InvalidMaxTopLevelKeys);
    }
    if config.schema.max_depth == 0 {
        return Err(ValidationError::InvalidMaxDepth);
    }
    Ok(())
}

fn validate_media(config: &Config) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&config.media.default_cluster_threshold) {
        return Err(ValidationError::InvalidClusterThreshold(config.media.default_cluster_threshold));
    }
    if config.media.embedding_dim == 0 {
        return Err(ValidationError::InvalidEmbeddingDim);
    }
    Ok(())
}

fn validate_queue(config: &Config) -> Result<(), ValidationError> {
    if config.queue.default_max_retries < 0 {
        return Err(ValidationError::NegativeMaxRetries);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::models::*;
    use super::*;

    fn create_test_config() -> Config {
        Config {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerSettings::default(),
            schema: SchemaConfig::default(),
            media: MediaConfig::default(),
            ingest: IngestConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_database_url() {
        let mut config = create_test_config();
        config.catalog.database_url = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyDatabaseUrl)));
    }

    #[test]
    fn test_connection_bounds_inverted() {
        let mut config = create_test_config();
        config.catalog.min_connections = 20;
        config.catalog.max_connections = 5;
        assert!(matches!(validate(&config), Err(ValidationError::ConnectionBoundsInverted { .. })));
    }

    #[test]
    fn test_no_workers() {
        let mut config = create_test_config();
        config.worker.num_workers = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_invalid_stability_threshold() {
        let mut config = create_test_config();
        config.schema.stability_threshold = 1.5;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidStabilityThreshold(_))));
    }

    #[test]
    fn test_invalid_cluster_threshold() {
        let mut config = create_test_config();
        config.media.default_cluster_threshold = -0.1;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidClusterThreshold(_))));
    }

    #[test]
    fn test_negative_max_retries() {
        let mut config = create_test_config();
        config.queue.default_max_retries = -1;
        assert!(matches!(validate(&config), Err(ValidationError::NegativeMaxRetries)));
    }
}
