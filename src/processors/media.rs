//! Drives each media asset through the external media service (decode,
//! hash, embed — out of scope here) and reconciles the result back onto
//! the catalog's storage contract: `uri`, `sha256`, `embedding`, `cluster_id`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::{cosine_similarity, Asset, AssetStatus, CatalogStore, Cluster, Lineage};
use crate::storage::StorageClient;

use super::traits::{ProcessError, ProcessOutcome, Processor};

#[derive(Debug, Clone)]
pub struct MediaAnalysis {
    pub sha256: String,
    pub embedding: Vec<f32>,
    pub content_type: String,
    pub metadata: serde_json::Value,
}

/// The normalization/embedding black box. Production deployments point
/// this at the real media pipeline (decode, perceptual hash, CLIP-style
/// embedding); `DefaultMediaService` below is a deterministic stand-in
/// that keeps the storage contract exercisable without one.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn analyze(&self, bytes: &[u8], content_type: Option<&str>) -> Result<MediaAnalysis, ProcessError>;
}

/// Deterministic placeholder: hashes the bytes for `sha256` and derives a
/// fixed-dimension unit embedding from the same digest. Not a real
/// perceptual model — swap in a `MediaService` backed by one for
/// production use.
pub struct DefaultMediaService {
    embedding_dim: usize,
}

impl DefaultMediaService {
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }
}

impl Default for DefaultMediaService {
    fn default() -> Self {
        Self::new(512)
    }
}

#[async_trait]
impl MediaService for DefaultMediaService {
    async fn analyze(&self, bytes: &[u8], content_type: Option<&str>) -> Result<MediaAnalysis, ProcessError> {
        if bytes.is_empty() {
            return Err(ProcessError::Permanent("empty media payload".to_string()));
        }

        let digest = Sha256::digest(bytes);
        let sha256 = format!("{digest:x}");

        let mut embedding = vec![0.0f32; self.embedding_dim];
        for (i, slot) in embedding.iter_mut().enumerate() {
            let byte = digest[i % digest.len()];
            *slot = (byte as f32 / 255.0) * 2.0 - 1.0;
        }
        crate::catalog::normalize(&mut embedding);

        Ok(MediaAnalysis {
            sha256,
            embedding,
            content_type: content_type.unwrap_or("application/octet-stream").to_string(),
            metadata: serde_json::json!({}),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MediaJobPayload {
    pub request_id: String,
    pub asset_ids: Vec<Uuid>,
    #[allow(dead_code)]
    pub owner: Option<String>,
}

pub struct MediaProcessor {
    catalog: CatalogStore,
    storage: StorageClient,
    media_service: Arc<dyn MediaService>,
    default_cluster_threshold: f64,
}

impl MediaProcessor {
    pub fn new(
        catalog: CatalogStore,
        storage: StorageClient,
        media_service: Arc<dyn MediaService>,
        default_cluster_threshold: f64,
    ) -> Self {
        Self {
            catalog,
            storage,
            media_service,
            default_cluster_threshold,
        }
    }

    async fn log_lineage(&self, request_id: &str, asset_id: Uuid, stage: &str, detail: serde_json::Value, success: bool, error_message: Option<String>) {
        let lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            asset_id: Some(asset_id),
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

    /// Finds the cluster whose centroid is most similar to `embedding`. If
    /// the best match clears its own threshold, the asset joins it;
    /// otherwise a new provisional cluster is created around `embedding`.
    async fn assign_cluster(&self, embedding: &[f32]) -> Result<Cluster, ProcessError> {
        let clusters = self
            .catalog
            .list_clusters()
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))?;

        let best = clusters
            .iter()
            .filter_map(|c| c.centroid.as_ref().map(|centroid| (c, cosine_similarity(centroid, embedding))))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((cluster, similarity)) = best {
            if similarity >= cluster.threshold {
                return Ok(cluster.clone());
            }
        }

        let now = Utc::now();
        let cluster = Cluster {
            id: Uuid::new_v4(),
            name: format!("cluster-{}", Uuid::new_v4()),
            centroid: Some(embedding.to_vec()),
            threshold: self.default_cluster_threshold,
            provisional: true,
            metadata: None,
            created_at: now,
            updated_at: now,
        };

        self.catalog
            .insert_cluster(&cluster)
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))
    }

    async fn process_one(&self, request_id: &str, asset_id: Uuid) -> Result<(), ProcessError> {
        let asset = self
            .catalog
            .get_asset(asset_id)
            .await
            .map_err(|e| ProcessError::Permanent(format!("asset {asset_id} not found: {e}")))?;

        self.catalog
            .update_asset_status(asset_id, AssetStatus::Processing)
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))?;

        let bytes = self
            .storage
            .retrieve(&asset.uri)
            .await
            .map_err(|e| ProcessError::Transient(format!("failed to retrieve {}: {e}", asset.uri)))?;

        let analysis = self.media_service.analyze(&bytes, asset.content_type.as_deref()).await?;

        let cluster = self.assign_cluster(&analysis.embedding).await?;

        let ext = std::path::Path::new(&asset.uri)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let filename = format!("{asset_id}.{ext}");
        let final_uri = self
            .storage
            .store_media(&cluster.id.to_string(), &asset_id.to_string(), bytes, &filename)
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE asset
            SET uri = $2, sha256 = $3, content_type = $4, embedding = $5, cluster_id = $6,
                metadata = $7, status = 'done', updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(asset_id)
        .bind(&final_uri)
        .bind(&analysis.sha256)
        .bind(&analysis.content_type)
        .bind(&analysis.embedding)
        .bind(cluster.id)
        .bind(&analysis.metadata)
        .execute(self.catalog.pool())
        .await
        .map_err(|e| ProcessError::Transient(e.to_string()))?;

        self.log_lineage(
            request_id,
            asset_id,
            "media_processing_complete",
            serde_json::json!({"cluster_id": cluster.id, "uri": final_uri}),
            true,
            None,
        )
        .await;

        Ok(())
    }
}

#[async_trait]
impl Processor for MediaProcessor {
    async fn process(&self, job_data: &serde_json::Value) -> Result<ProcessOutcome, ProcessError> {
        let payload: MediaJobPayload = serde_json::from_value(job_data.clone())
            .map_err(|e| ProcessError::Permanent(format!("invalid media job payload: {e}")))?;

        let mut asset_ids = Vec::new();
        let mut first_error = None;

        for asset_id in &payload.asset_ids {
            match self.process_one(&payload.request_id, *asset_id).await {
                Ok(()) => asset_ids.push(*asset_id),
                Err(e) => {
                    tracing::warn!(asset_id = %asset_id, error = %e.message(), "media asset processing failed");
                    let _ = self.catalog.update_asset_status(*asset_id, AssetStatus::Failed).await;
                    self.log_lineage(
                        &payload.request_id,
                        *asset_id,
                        "media_processing_error",
                        serde_json::json!({"error": e.message()}),
                        false,
                        Some(e.message()),
                    )
                    .await;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(ProcessOutcome { asset_ids }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_media_service_produces_unit_embedding() {
        let service = DefaultMediaService::default();
        let analysis = service.analyze(b"some image bytes", Some("image/png")).await.unwrap();
        let norm: f64 = analysis
            .embedding
            .iter()
            .map(|x| (*x as f64).powi(2))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert_eq!(analysis.embedding.len(), 512);
    }

    #[tokio::test]
    async fn rejects_empty_payload() {
        let service = DefaultMediaService::default();
        assert!(service.analyze(b"", None).await.is_err());
    }
}
