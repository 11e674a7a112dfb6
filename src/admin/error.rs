//! Admin-operation error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Catalog(#[from] crate::catalog::CatalogError),
    #[error("failed to execute schema DDL: {0}")]
    DdlExecution(#[from] sqlx::Error),
}
