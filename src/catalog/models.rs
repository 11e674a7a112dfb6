//! Catalog entities: assets, jobs, schemas, clusters, lineage.
//!
//! Mirrors the relational shape of the original Python ORM models
//! (`asset_raw`, `asset`, `job`, `schema_def`, `cluster`, `lineage`), with
//! `sqlx::FromRow` in place of an ORM mapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum AssetKind {
    Media,
    Json,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum AssetStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum JobType {
    Media,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum StorageChoice {
    Sql,
    Jsonb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SchemaStatus {
    Provisional,
    Active,
    Rejected,
}

/// Immutable record of an uploaded byte stream. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawAsset {
    pub id: Uuid,
    pub request_id: String,
    pub part_id: String,
    pub uri: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Canonical, post-processing handle to a unit of ingested content.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Asset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub uri: String,
    pub sha256: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub owner: Option<String>,
    pub status: AssetStatus,
    pub cluster_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    pub embedding: Option<Vec<f32>>,
    pub schema_id: Option<Uuid>,
    pub raw_asset_id: Option<Uuid>,
    pub parent_asset_id: Option<Uuid>,
    /// Free-form key-value metadata (EXIF, VLM output, admin notes, ...).
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of background work tracked in the catalog and mirrored in the queue.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    /// The idempotency key. Unique: concurrent creates with the same key
    /// must resolve to the same row.
    pub request_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub job_data: serde_json::Value,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub dead_letter: bool,
    pub error_message: Option<String>,
    pub asset_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A storage plan for a family of JSON documents.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SchemaDef {
    pub id: Uuid,
    pub name: String,
    /// Deterministically derived from flattened field paths and dominant types.
    pub structure_hash: String,
    pub storage_choice: StorageChoice,
    pub version: i32,
    pub ddl: Option<String>,
    pub status: SchemaStatus,
    pub sample_size: Option<i32>,
    pub field_stability: Option<f64>,
    pub type_stability: Option<f64>,
    pub max_depth: Option<i32>,
    pub top_level_keys: Option<i32>,
    pub decision_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A centroid of media embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cluster {
    pub id: Uuid,
    pub name: String,
    pub centroid: Option<Vec<f32>>,
    pub threshold: f64,
    pub provisional: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lineage {
    pub id: Uuid,
    pub request_id: String,
    pub asset_id: Option<Uuid>,
    pub schema_id: Option<Uuid>,
    pub stage: String,
    pub detail: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_round_trips_through_json() {
        let status = JobStatus::Queued;
        let encoded = serde_json::to_string(&status).unwrap();
        let decoded: JobStatus = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, status);
    }
}
