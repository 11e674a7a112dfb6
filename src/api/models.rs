//! HTTP request/response DTOs for the ingest, job-status, admin, and health
//! endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}

/// Non-file fields of a multipart ingest request.
#[derive(Debug, Default, Deserialize)]
pub struct IngestFormFields {
    pub owner: Option<String>,
    pub comments: Option<String>,
    pub json: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectSchemaRequest {
    pub reviewed_by: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveSchemaRequest {
    pub reviewed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameClusterRequest {
    pub new_name: String,
    pub performed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeClustersRequest {
    pub source_cluster_ids: Vec<Uuid>,
    pub performed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateThresholdRequest {
    pub threshold: f64,
    pub performed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmClusterRequest {
    pub performed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeCandidatesQuery {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_similarity_threshold() -> f64 {
    0.9
}

#[derive(Debug, Deserialize)]
pub struct ListClustersQuery {
    #[serde(default)]
    pub provisional_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListSchemasQuery {
    pub status: Option<crate::catalog::SchemaStatus>,
}
