use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post, routing::put};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{
        approve_schema, cluster_statistics, confirm_cluster, get_cluster, get_job, get_schema, health, ingest,
        list_clusters, list_schemas, merge_candidates, merge_clusters, reject_schema, rename_cluster,
        update_cluster_threshold,
    },
    state::AppState,
};
use crate::admin::AdminHandlers;
use crate::catalog::{self, CatalogStore};
use crate::config::{Config, QueueBackendKind};
use crate::ingest::IngestOrchestrator;
use crate::observability::Metrics;
use crate::processors::{DefaultMediaService, JsonProcessor, MediaProcessor, ProcessorRegistry};
use crate::queue::{DistributedQueue, InProcessQueue, QueueBackend};
use crate::schema::DeciderConfig;
use crate::storage::StorageClient;
use crate::worker::{WorkerConfig, WorkerSupervisor};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(config: Config) -> Result<(), AnyError> {
    info!(database_url = %redact(&config.catalog.database_url), "connecting to catalog");
    let pool = catalog::connect(&config.catalog.database_url, config.catalog.max_connections, config.catalog.min_connections).await?;
    catalog::migrate(&pool).await?;
    let catalog_store = CatalogStore::new(pool.clone());

    let storage = match &config.storage.local_root {
        Some(root) => {
            info!(root = %root.display(), "using local filesystem storage");
            StorageClient::local(root)?
        }
        None => {
            info!("using in-memory storage");
            StorageClient::in_memory()
        }
    };

    let queue: Arc<dyn QueueBackend> = match config.queue.backend {
        QueueBackendKind::Inproc => {
            info!("using in-process queue backend");
            Arc::new(InProcessQueue::new(config.queue.default_max_retries))
        }
        QueueBackendKind::Distributed => {
            info!("using distributed (Postgres-backed) queue backend");
            Arc::new(DistributedQueue::new(pool.clone()))
        }
    };

    let decider_config = DeciderConfig {
        sample_size: config.schema.sample_size,
        stability_threshold: config.schema.stability_threshold,
        max_top_level_keys: config.schema.max_top_level_keys,
        max_depth: config.schema.max_depth,
    };
    let json_processor = Arc::new(JsonProcessor::new(catalog_store.clone(), decider_config, config.schema.auto_migrate));
    let media_service = Arc::new(DefaultMediaService::new(config.media.embedding_dim));
    let media_processor = Arc::new(MediaProcessor::new(
        catalog_store.clone(),
        storage.clone(),
        media_service,
        config.media.default_cluster_threshold,
    ));

    let mut processors = ProcessorRegistry::new();
    processors.register("json", json_processor);
    processors.register("media", media_processor);

    let metrics = Arc::new(Metrics::new());
    let worker_config = WorkerConfig {
        num_workers: config.worker.num_workers,
        poll_interval_ms: config.worker.poll_interval_ms,
        shutdown_timeout_ms: config.worker.shutdown_timeout_ms,
    };
    let shutdown_timeout = std::time::Duration::from_millis(worker_config.shutdown_timeout_ms);
    let mut supervisor = WorkerSupervisor::new(queue.clone(), catalog_store.clone(), processors, metrics.clone(), worker_config);
    supervisor.spawn();

    let ingest_orchestrator = IngestOrchestrator::new(catalog_store.clone(), storage.clone(), queue.clone());
    let admin_handlers = AdminHandlers::new(catalog_store.clone(), metrics.clone());

    let bind_addr = config.server.bind_addr;
    let state = AppState::new(config, catalog_store, storage, queue, ingest_orchestrator, admin_handlers, metrics);

    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(address = %bind_addr, "MammothBox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.stop(shutdown_timeout).await;

    Ok(())
}

/// Builds the full route table over a given [`AppState`]. Split out from
/// [`run`] so integration tests can mount the same router without binding a
/// socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/jobs/{job_id}", get(get_job))
        .route("/health", get(health))
        .route("/admin/schemas", get(list_schemas))
        .route("/admin/schemas/{schema_id}", get(get_schema))
        .route("/admin/schemas/{schema_id}/approve", post(approve_schema))
        .route("/admin/schemas/{schema_id}/reject", post(reject_schema))
        .route("/admin/clusters", get(list_clusters))
        .route("/admin/clusters/{cluster_id}", get(get_cluster))
        .route("/admin/clusters/{cluster_id}/rename", put(rename_cluster))
        .route("/admin/clusters/{cluster_id}/merge", post(merge_clusters))
        .route("/admin/clusters/{cluster_id}/threshold", put(update_cluster_threshold))
        .route("/admin/clusters/{cluster_id}/confirm", post(confirm_cluster))
        .route("/admin/clusters/statistics", get(cluster_statistics))
        .route("/admin/clusters/merge-candidates", get(merge_candidates))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
}

/// Strips `user:pass@` credentials from a Postgres connection string before
/// logging it.
fn redact(database_url: &str) -> String {
    match database_url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host_and_path)) => format!("{scheme}://***@{host_and_path}"),
            None => database_url.to_string(),
        },
        None => database_url.to_string(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
