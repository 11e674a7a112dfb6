use std::sync::Arc;

use crate::admin::AdminHandlers;
use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::ingest::IngestOrchestrator;
use crate::observability::Metrics;
use crate::queue::QueueBackend;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: CatalogStore,
    pub storage: StorageClient,
    pub queue: Arc<dyn QueueBackend>,
    pub ingest: Arc<IngestOrchestrator>,
    pub admin: Arc<AdminHandlers>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog: CatalogStore,
        storage: StorageClient,
        queue: Arc<dyn QueueBackend>,
        ingest: IngestOrchestrator,
        admin: AdminHandlers,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            storage,
            queue,
            ingest: Arc::new(ingest),
            admin: Arc::new(admin),
            metrics,
        }
    }
}
