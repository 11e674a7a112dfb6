//! Error types for the catalog layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Coarse error-kind taxonomy shared with the HTTP layer (see `crate::api::error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    NotFound,
    Conflict,
    InvalidState,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl CatalogError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Whether this error was caused by a unique/foreign-key constraint violation,
    /// as reported by the underlying driver.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Db(e) if e
            .as_database_error()
            .map(|d| d.is_unique_violation())
            .unwrap_or(false))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Constraint(_) => ErrorKind::Conflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}
