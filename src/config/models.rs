use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

/// Postgres connection settings for the catalog database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_database_url() -> String {
    "postgres://localhost/mammothbox".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    Inproc,
    Distributed,
}

impl Default for QueueBackendKind {
    fn default() -> Self {
        QueueBackendKind::Inproc
    }
}

/// Job queue selection. `Inproc` keeps messages in a process-local heap
/// (single replica deployments); `Distributed` claims rows from the
/// catalog database via `SELECT ... FOR UPDATE SKIP LOCKED` so several
/// worker replicas can share one queue.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackendKind,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackendKind::default(),
            default_max_retries: default_max_retries(),
        }
    }
}

fn default_max_retries() -> i32 {
    3
}

/// Worker pool sizing, mirrored into [`crate::worker::WorkerConfig`] at
/// startup.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WorkerSettings {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

fn default_num_workers() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

/// JSON schema decision thresholds, mirrored into
/// [`crate::schema::DeciderConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: f64,
    #[serde(default = "default_max_top_level_keys")]
    pub max_top_level_keys: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// When true, newly decided schemas go straight to `active` (their DDL
    /// is executed immediately); otherwise they land `provisional` and wait
    /// for an admin to approve them.
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            stability_threshold: default_stability_threshold(),
            max_top_level_keys: default_max_top_level_keys(),
            max_depth: default_max_depth(),
            auto_migrate: false,
        }
    }
}

fn default_sample_size() -> usize {
    128
}

fn default_stability_threshold() -> f64 {
    0.6
}

fn default_max_top_level_keys() -> usize {
    20
}

fn default_max_depth() -> usize {
    2
}

/// Media-pipeline knobs: embedding width for [`crate::processors::DefaultMediaService`]
/// and the similarity threshold a brand-new provisional cluster is seeded with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_cluster_threshold")]
    pub default_cluster_threshold: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            default_cluster_threshold: default_cluster_threshold(),
        }
    }
}

fn default_embedding_dim() -> usize {
    512
}

fn default_cluster_threshold() -> f64 {
    0.85
}

/// Upload validation ceilings, mirrored into [`crate::ingest::validator`]'s
/// constants at the call sites that need a runtime override; the module's
/// own constants remain the defaults these fall back to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_job_max_retries")]
    pub job_max_retries: i32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { job_max_retries: default_job_max_retries() }
    }
}

fn default_job_max_retries() -> i32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_addr: default_metrics_addr(),
            otlp_endpoint: None,
        }
    }
}

fn default_metrics_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().unwrap()
}

/// Local-disk storage root, used when no object-store provider is
/// configured. Kept as a bare path rather than a full provider enum since
/// `StorageClient::local`/`StorageClient::in_memory` are the only two
/// backends this build wires up; a real S3 deployment would add a
/// provider switch here the way the catalog's queue backend does.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub local_root: Option<std::path::PathBuf>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_root: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize(500 * 1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerSettings::default(),
            schema: SchemaConfig::default(),
            media: MediaConfig::default(),
            ingest: IngestConfig::default(),
            telemetry: TelemetryConfig::default(),
        };

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.worker.num_workers, 4);
        assert_eq!(config.schema.max_top_level_keys, 20);
        assert_eq!(config.queue.backend, QueueBackendKind::Inproc);
    }
}
