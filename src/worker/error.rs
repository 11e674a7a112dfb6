//! Worker-loop error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    #[error("catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),
}
