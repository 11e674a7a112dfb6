//! HTTP handlers for ingest, job status, admin review workflows, and health.

use axum::extract::{Multipart, Path, Query, State};
use axum::{Json, http::HeaderMap, http::StatusCode, response::IntoResponse};
use std::collections::HashMap;
use uuid::Uuid;

use super::error::ApiError;
use super::models::{
    ApproveSchemaRequest, ConfirmClusterRequest, HealthResponse, ListClustersQuery, ListSchemasQuery,
    MergeCandidatesQuery, MergeClustersRequest, RejectSchemaRequest, RenameClusterRequest, UpdateThresholdRequest,
};
use super::state::AppState;
use crate::ingest::{FilePart, IngestRequest};

/// Ingest endpoint (`POST /ingest`).
///
/// Accepts a multipart form: zero or more `file` parts carrying media or
/// document bytes, an optional `json` field carrying a JSON object or array
/// of documents, and optional `owner`/`comments` fields. A repeated
/// `X-Idempotency-Key` header returns the original job instead of
/// re-ingesting.
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let idempotency_key = headers
        .get("X-Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .filter(|v| !v.is_empty());

    let mut files = Vec::new();
    let mut json_payload = None;
    let mut owner = None;
    let mut comments = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidPayload(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "json" => json_payload = Some(field.text().await.map_err(|e| ApiError::InvalidPayload(e.to_string()))?),
            "owner" => owner = Some(field.text().await.map_err(|e| ApiError::InvalidPayload(e.to_string()))?),
            "comments" => comments = Some(field.text().await.map_err(|e| ApiError::InvalidPayload(e.to_string()))?),
            "file" | "files" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::InvalidPayload(e.to_string()))?.to_vec();
                files.push(FilePart { filename, content_type, bytes });
            }
            _ => {}
        }
    }

    let request = IngestRequest { files, json_payload, owner, comments, idempotency_key };

    let accepted = state.ingest.ingest(request).await?;
    state.metrics.job_accepted();

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Job status endpoint (`GET /jobs/:job_id`).
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let job = state.catalog.get_job(job_id).await?;
    Ok(Json(job))
}

/// Health check endpoint (`GET /health`).
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();

    let catalog_healthy = sqlx::query("SELECT 1").execute(state.catalog.pool()).await.is_ok();
    components.insert("catalog".to_string(), if catalog_healthy { "healthy" } else { "unhealthy" }.to_string());
    components.insert("queue".to_string(), "healthy".to_string());
    components.insert("storage".to_string(), "healthy".to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let status_code = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

// ---- admin: schemas --------------------------------------------------------

pub async fn list_schemas(
    State(state): State<AppState>,
    Query(query): Query<ListSchemasQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let schemas = state.admin.list_schemas(query.status).await?;
    Ok(Json(schemas))
}

pub async fn get_schema(State(state): State<AppState>, Path(schema_id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let schema = state.admin.get_schema(schema_id).await?;
    Ok(Json(schema))
}

pub async fn approve_schema(
    State(state): State<AppState>,
    Path(schema_id): Path<Uuid>,
    Json(body): Json<ApproveSchemaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schema = state.admin.approve_schema(schema_id, &body.reviewed_by).await?;
    Ok(Json(schema))
}

pub async fn reject_schema(
    State(state): State<AppState>,
    Path(schema_id): Path<Uuid>,
    Json(body): Json<RejectSchemaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schema = state.admin.reject_schema(schema_id, &body.reviewed_by, &body.reason).await?;
    Ok(Json(schema))
}

// ---- admin: clusters --------------------------------------------------------

pub async fn list_clusters(
    State(state): State<AppState>,
    Query(query): Query<ListClustersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let clusters = state.admin.list_clusters(query.provisional_only).await?;
    Ok(Json(clusters))
}

pub async fn get_cluster(State(state): State<AppState>, Path(cluster_id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let cluster = state.admin.get_cluster(cluster_id).await?;
    Ok(Json(cluster))
}

pub async fn rename_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
    Json(body): Json<RenameClusterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cluster = state.admin.rename_cluster(cluster_id, &body.new_name, &body.performed_by).await?;
    Ok(Json(cluster))
}

pub async fn merge_clusters(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
    Json(body): Json<MergeClustersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cluster = state
        .admin
        .merge_clusters(&body.source_cluster_ids, cluster_id, &body.performed_by)
        .await?;
    Ok(Json(cluster))
}

pub async fn update_cluster_threshold(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
    Json(body): Json<UpdateThresholdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cluster = state.admin.update_cluster_threshold(cluster_id, body.threshold, &body.performed_by).await?;
    Ok(Json(cluster))
}

pub async fn confirm_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<Uuid>,
    Json(body): Json<ConfirmClusterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cluster = state.admin.confirm_cluster(cluster_id, &body.performed_by).await?;
    Ok(Json(cluster))
}

pub async fn cluster_statistics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.admin.cluster_statistics().await?;
    Ok(Json(stats))
}

pub async fn merge_candidates(
    State(state): State<AppState>,
    Query(query): Query<MergeCandidatesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let candidates = state.admin.identify_merge_candidates(query.similarity_threshold).await?;
    Ok(Json(candidates))
}
