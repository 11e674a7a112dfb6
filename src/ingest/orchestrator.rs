//! Coordinates a single ingest request: validate, store raw bytes, create
//! placeholder assets and the tracking job, log lineage, enqueue.

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{
    Asset, AssetKind, AssetStatus, CatalogError, CatalogStore, Job, JobStatus, JobType as CatalogJobType, Lineage, RawAsset,
};
use crate::queue::{JobType as QueueJobType, QueueBackend, QueueMessage};
use crate::storage::StorageClient;

use super::validator::{self, FilePartValidation, ValidationError};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("no valid assets to process")]
    NoValidAssets,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
    #[error(transparent)]
    Queue(#[from] crate::queue::QueueError),
}

/// One file part of a multipart ingest request, already read into memory.
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct IngestRequest {
    pub files: Vec<FilePart>,
    pub json_payload: Option<String>,
    pub owner: Option<String>,
    pub comments: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestAccepted {
    pub job_id: Uuid,
    pub system_ids: Vec<Uuid>,
    pub status: String,
    pub request_id: String,
    pub created_at: chrono::DateTime<Utc>,
    pub message: Option<String>,
}

pub struct IngestOrchestrator {
    catalog: CatalogStore,
    storage: StorageClient,
    queue: std::sync::Arc<dyn QueueBackend>,
}

impl IngestOrchestrator {
    pub fn new(catalog: CatalogStore, storage: StorageClient, queue: std::sync::Arc<dyn QueueBackend>) -> Self {
        Self { catalog, storage, queue }
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestAccepted, OrchestrationError> {
        let request_id = request.idempotency_key.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(key) = &request.idempotency_key {
            if let Ok(existing) = self.catalog.get_job_by_request_id(key).await {
                return Ok(IngestAccepted {
                    job_id: existing.id,
                    system_ids: existing.asset_ids.clone(),
                    status: "accepted".to_string(),
                    request_id,
                    created_at: existing.created_at,
                    message: Some("duplicate request (idempotency key)".to_string()),
                });
            }
        }

        validator::require_nonempty_request(!request.files.is_empty(), request.json_payload.is_some())?;

        let mut asset_ids = Vec::new();
        let mut has_media = false;
        let mut has_json = false;

        for file in &request.files {
            match self.process_file(&request_id, file, request.owner.as_deref()).await {
                Ok(asset_id) => {
                    asset_ids.push(asset_id);
                    has_media = true;
                }
                Err(e) => {
                    self.log_lineage(&request_id, None, "file_validation_failed", serde_json::json!({"filename": file.filename, "error": e.to_string()}), false, Some(e.to_string()))
                        .await;
                }
            }
        }

        let mut documents: Vec<serde_json::Value> = Vec::new();
        if let Some(payload) = &request.json_payload {
            let validated = validator::validate_json_payload(payload)?;
            for doc in &validated.documents {
                let asset_id = self.process_json_document(&request_id, doc, request.owner.as_deref()).await?;
                asset_ids.push(asset_id);
                has_json = true;
            }
            documents = validated.documents;
        }
        let json_count = documents.len();

        if asset_ids.is_empty() {
            return Err(OrchestrationError::NoValidAssets);
        }

        let job_type = if has_media { CatalogJobType::Media } else if has_json { CatalogJobType::Json } else { CatalogJobType::Json };

        let job_id = Uuid::new_v4();
        let job_data = serde_json::json!({
            "job_id": job_id,
            "request_id": request_id,
            "owner": request.owner,
            "comments": request.comments,
            "file_count": request.files.len(),
            "json_count": json_count,
            "documents": documents,
            "asset_ids": asset_ids,
        });

        let job = Job {
            id: job_id,
            request_id: request_id.clone(),
            job_type,
            status: JobStatus::Queued,
            job_data: job_data.clone(),
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            dead_letter: false,
            error_message: None,
            asset_ids: asset_ids.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let accepted_lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: request_id.clone(),
            asset_id: None,
            schema_id: None,
            stage: "ingest_accepted".to_string(),
            detail: Some(serde_json::json!({"job_id": job_id, "asset_count": asset_ids.len(), "job_type": job_type})),
            success: true,
            error_message: None,
            created_at: Utc::now(),
        };

        let (job, created) = self.catalog.create_job_with_lineage(&job, &accepted_lineage).await?;

        if !created {
            return Ok(IngestAccepted {
                job_id: job.id,
                system_ids: job.asset_ids,
                status: "accepted".to_string(),
                request_id,
                created_at: job.created_at,
                message: Some("duplicate request (idempotency key)".to_string()),
            });
        }

        let queue_job_type = match job_type {
            CatalogJobType::Media => QueueJobType::Media,
            CatalogJobType::Json => QueueJobType::Json,
        };
        let message = QueueMessage::new(job_id, queue_job_type, job_data).with_max_retries(3);
        self.queue.enqueue(message).await?;

        Ok(IngestAccepted {
            job_id,
            system_ids: asset_ids,
            status: "accepted".to_string(),
            request_id,
            created_at: job.created_at,
            message: None,
        })
    }

    async fn process_file(&self, request_id: &str, file: &FilePart, owner: Option<&str>) -> Result<Uuid, OrchestrationError> {
        let FilePartValidation { kind, content_type, size_bytes, sha256 } =
            validator::validate_file_part(&file.filename, &file.content_type, &file.bytes)?;

        let part_id = Uuid::new_v4().to_string();
        let uri = self.storage.store_raw(request_id, &part_id, file.bytes.clone(), &file.filename).await?;

        let raw_asset_id = Uuid::new_v4();
        let asset_id = Uuid::new_v4();
        let now = Utc::now();

        let raw_asset = RawAsset {
            id: raw_asset_id,
            request_id: request_id.to_string(),
            part_id,
            uri: uri.clone(),
            size_bytes: size_bytes as i64,
            content_type: Some(content_type.clone()),
            created_at: now,
        };

        let asset = Asset {
            id: asset_id,
            kind,
            uri: uri.clone(),
            sha256: Some(sha256),
            content_type: Some(content_type.clone()),
            size_bytes: size_bytes as i64,
            owner: owner.map(str::to_string),
            status: AssetStatus::Queued,
            cluster_id: None,
            tags: None,
            embedding: None,
            schema_id: None,
            raw_asset_id: Some(raw_asset_id),
            parent_asset_id: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        };

        let lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            asset_id: Some(asset_id),
            schema_id: None,
            stage: "raw_stored".to_string(),
            detail: Some(serde_json::json!({"uri": uri, "size_bytes": size_bytes, "content_type": content_type})),
            success: true,
            error_message: None,
            created_at: now,
        };

        self.catalog.insert_file_asset(&raw_asset, &asset, &lineage).await?;

        Ok(asset_id)
    }

    async fn process_json_document(&self, request_id: &str, doc: &serde_json::Value, owner: Option<&str>) -> Result<Uuid, OrchestrationError> {
        let canonical = serde_json::to_vec(doc).unwrap_or_default();
        let doc_hash = format!("{:x}", Sha256::digest(&canonical));

        let asset_id = Uuid::new_v4();
        let now = Utc::now();
        let asset = Asset {
            id: asset_id,
            kind: AssetKind::Json,
            uri: format!("json://pending/{doc_hash}"),
            sha256: Some(doc_hash),
            content_type: Some("application/json".to_string()),
            size_bytes: canonical.len() as i64,
            owner: owner.map(str::to_string),
            status: AssetStatus::Queued,
            cluster_id: None,
            tags: None,
            embedding: None,
            schema_id: None,
            raw_asset_id: None,
            parent_asset_id: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        };

        let lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            asset_id: Some(asset_id),
            schema_id: None,
            stage: "json_validated".to_string(),
            detail: Some(serde_json::json!({"size_bytes": canonical.len()})),
            success: true,
            error_message: None,
            created_at: now,
        };

        self.catalog.insert_json_asset(&asset, &lineage).await?;

        Ok(asset_id)
    }

    async fn log_lineage(
        &self,
        request_id: &str,
        asset_id: Option<Uuid>,
        stage: &str,
        detail: serde_json::Value,
        success: bool,
        error_message: Option<String>,
    ) {
        let lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            asset_id,
            schema_id: None,
            stage: stage.to_string(),
            detail: Some(detail),
            success,
            error_message,
            created_at: Utc::now(),
        };
        if let Err(e) = self.catalog.record_lineage(&lineage).await {
            tracing::warn!(error = %e, stage, "failed to record lineage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_part_validation_rejects_nothing_when_well_formed() {
        let result = validator::validate_file_part("a.json", "application/json", b"{}").unwrap();
        assert_eq!(result.kind, AssetKind::Json);
    }
}
