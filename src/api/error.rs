use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("unsupported job type: {0}")]
    UnsupportedJobType(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedJobType(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedJobType(_) => "UNSUPPORTED_JOB_TYPE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<crate::ingest::OrchestrationError> for ApiError {
    fn from(value: crate::ingest::OrchestrationError) -> Self {
        use crate::ingest::OrchestrationError as E;
        match value {
            E::Validation(e) => ApiError::InvalidPayload(e.to_string()),
            E::NoValidAssets => ApiError::InvalidPayload("no valid assets to process".to_string()),
            E::Catalog(e) => e.into(),
            E::Storage(e) => ApiError::Internal(e.to_string()),
            E::Queue(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::admin::AdminError> for ApiError {
    fn from(value: crate::admin::AdminError) -> Self {
        use crate::admin::AdminError as E;
        match value {
            E::NotFound(msg) => ApiError::NotFound(msg),
            E::InvalidRequest(msg) => ApiError::Conflict(msg),
            E::Catalog(e) => e.into(),
            E::DdlExecution(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::catalog::CatalogError> for ApiError {
    fn from(value: crate::catalog::CatalogError) -> Self {
        use crate::catalog::ErrorKind;
        match value.kind() {
            ErrorKind::NotFound => ApiError::NotFound(value.to_string()),
            ErrorKind::Conflict | ErrorKind::InvalidState => ApiError::Conflict(value.to_string()),
            ErrorKind::Storage => ApiError::Internal(value.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}
