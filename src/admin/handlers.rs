//! Human-in-the-loop workflows: reviewing schema proposals and managing
//! media clusters (rename, merge, threshold tuning, confirmation).

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{cosine_similarity, mean_unit_vector, CatalogStore, Cluster, Lineage, SchemaDef, SchemaStatus};
use crate::observability::Metrics;

use super::error::AdminError;

pub type Result<T> = std::result::Result<T, AdminError>;

#[derive(Debug, Clone, Serialize)]
pub struct SchemaSummary {
    pub schema: SchemaDef,
    pub asset_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub cluster: Cluster,
    pub asset_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CentroidQuality {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterDetail {
    pub cluster: Cluster,
    pub asset_count: i64,
    pub centroid_quality: Option<CentroidQuality>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatistics {
    pub total_clusters: i64,
    pub provisional_clusters: i64,
    pub confirmed_clusters: i64,
    pub total_assets: i64,
    pub assets_in_clusters: i64,
    pub unclustered_assets: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeCandidate {
    pub cluster_a: Uuid,
    pub cluster_b: Uuid,
    pub similarity: f64,
}

pub struct AdminHandlers {
    catalog: CatalogStore,
    metrics: Arc<Metrics>,
}

impl AdminHandlers {
    pub fn new(catalog: CatalogStore, metrics: Arc<Metrics>) -> Self {
        Self { catalog, metrics }
    }

    async fn log_admin_action(&self, action: &str, target_id: Uuid, schema_target: bool, performed_by: &str, detail: serde_json::Value) {
        let lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: format!("admin_{performed_by}_{}", Utc::now().timestamp()),
            asset_id: None,
            schema_id: if schema_target { Some(target_id) } else { None },
            stage: format!("admin_{action}"),
            detail: Some(detail),
            success: true,
            error_message: None,
            created_at: Utc::now(),
        };
        if let Err(e) = self.catalog.record_lineage(&lineage).await {
            tracing::warn!(error = %e, action, "failed to record admin lineage");
        }
    }

    // ---- schemas -----------------------------------------------------

    pub async fn list_schemas(&self, status: Option<SchemaStatus>) -> Result<Vec<SchemaSummary>> {
        let mut summaries = Vec::new();
        for schema in self.catalog.list_schemas(status).await? {
            let asset_count = self.catalog.count_assets_by_schema(schema.id).await?;
            summaries.push(SchemaSummary { schema, asset_count });
        }
        Ok(summaries)
    }

    pub async fn get_schema(&self, schema_id: Uuid) -> Result<SchemaSummary> {
        let schema = self.catalog.get_schema(schema_id).await?;
        let asset_count = self.catalog.count_assets_by_schema(schema_id).await?;
        Ok(SchemaSummary { schema, asset_count })
    }

    /// Approves a provisional schema: executes its stored DDL (schemas
    /// always carry DDL, generated at creation regardless of auto-migrate
    /// status) and flips status to active.
    pub async fn approve_schema(&self, schema_id: Uuid, reviewed_by: &str) -> Result<SchemaSummary> {
        let schema = self.catalog.get_schema(schema_id).await?;
        if schema.status != SchemaStatus::Provisional {
            return Err(AdminError::InvalidRequest(format!("schema {} is not provisional (status: {:?})", schema.name, schema.status)));
        }

        let ddl = schema.ddl.clone().unwrap_or_default();
        if !ddl.is_empty() {
            sqlx::raw_sql(&ddl).execute(self.catalog.pool()).await?;
        }

        let updated = self.catalog.approve_schema(schema_id, reviewed_by, &ddl).await?;

        self.log_admin_action(
            "schema_approved",
            schema_id,
            true,
            reviewed_by,
            serde_json::json!({"schema_name": updated.name, "storage_choice": updated.storage_choice}),
        )
        .await;
        self.metrics.schema_approved();

        self.get_schema(schema_id).await
    }

    pub async fn reject_schema(&self, schema_id: Uuid, reviewed_by: &str, reason: &str) -> Result<SchemaSummary> {
        let schema = self.catalog.get_schema(schema_id).await?;
        if schema.status != SchemaStatus::Provisional {
            return Err(AdminError::InvalidRequest(format!("schema {} is not provisional (status: {:?})", schema.name, schema.status)));
        }

        let updated = self.catalog.reject_schema(schema_id, reviewed_by, reason).await?;

        self.log_admin_action(
            "schema_rejected",
            schema_id,
            true,
            reviewed_by,
            serde_json::json!({"schema_name": updated.name, "reason": reason}),
        )
        .await;
        self.metrics.schema_rejected();

        self.get_schema(schema_id).await
    }

    // ---- clusters ------------------------------------------------------

    pub async fn list_clusters(&self, provisional_only: bool) -> Result<Vec<ClusterSummary>> {
        let mut summaries = Vec::new();
        for cluster in self.catalog.list_clusters().await? {
            if provisional_only && !cluster.provisional {
                continue;
            }
            let asset_count = self.catalog.list_assets_by_cluster(cluster.id).await?.len() as i64;
            summaries.push(ClusterSummary { cluster, asset_count });
        }
        Ok(summaries)
    }

    pub async fn get_cluster(&self, cluster_id: Uuid) -> Result<ClusterDetail> {
        let cluster = self.catalog.get_cluster(cluster_id).await?;
        let assets = self.catalog.list_assets_by_cluster(cluster_id).await?;

        let centroid_quality = cluster.centroid.as_ref().map(|centroid| {
            let similarities: Vec<f64> = assets
                .iter()
                .filter_map(|a| a.embedding.as_ref())
                .map(|e| cosine_similarity(centroid, e))
                .collect();

            if similarities.is_empty() {
                CentroidQuality { mean: 0.0, min: 0.0, max: 0.0 }
            } else {
                let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
                let min = similarities.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = similarities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                CentroidQuality { mean, min, max }
            }
        });

        Ok(ClusterDetail {
            asset_count: assets.len() as i64,
            cluster,
            centroid_quality,
        })
    }

    pub async fn rename_cluster(&self, cluster_id: Uuid, new_name: &str, performed_by: &str) -> Result<ClusterDetail> {
        let old = self.catalog.get_cluster(cluster_id).await?;
        let updated = self.catalog.rename_cluster(cluster_id, new_name).await?;

        self.log_admin_action(
            "cluster_renamed",
            cluster_id,
            false,
            performed_by,
            serde_json::json!({"old_name": old.name, "new_name": updated.name}),
        )
        .await;

        self.get_cluster(cluster_id).await
    }

    /// Reassigns every asset from each source cluster onto `target`, then
    /// recomputes the target centroid as the mean unit vector over all of
    /// the target's (now-merged) embeddings.
    pub async fn merge_clusters(&self, source_cluster_ids: &[Uuid], target_cluster_id: Uuid, performed_by: &str) -> Result<ClusterDetail> {
        if source_cluster_ids.contains(&target_cluster_id) {
            return Err(AdminError::InvalidRequest("cannot merge a cluster into itself".to_string()));
        }

        let mut source_names = Vec::new();
        for source_id in source_cluster_ids {
            let source = self.catalog.get_cluster(*source_id).await?;
            source_names.push(source.name);
            self.catalog.merge_clusters(target_cluster_id, *source_id).await?;
        }

        let assets = self.catalog.list_assets_by_cluster(target_cluster_id).await?;
        let embeddings: Vec<Vec<f32>> = assets.into_iter().filter_map(|a| a.embedding).collect();
        if let Some(centroid) = mean_unit_vector(&embeddings) {
            sqlx::query("UPDATE cluster SET centroid = $2, updated_at = now() WHERE id = $1")
                .bind(target_cluster_id)
                .bind(&centroid)
                .execute(self.catalog.pool())
                .await?;
        }

        self.log_admin_action(
            "clusters_merged",
            target_cluster_id,
            false,
            performed_by,
            serde_json::json!({"source_cluster_ids": source_cluster_ids, "source_cluster_names": source_names}),
        )
        .await;
        self.metrics.clusters_merged();

        self.get_cluster(target_cluster_id).await
    }

    pub async fn update_cluster_threshold(&self, cluster_id: Uuid, threshold: f64, performed_by: &str) -> Result<ClusterDetail> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AdminError::InvalidRequest("threshold must be between 0.0 and 1.0".to_string()));
        }

        let old = self.catalog.get_cluster(cluster_id).await?;
        self.catalog.update_cluster_threshold(cluster_id, threshold).await?;

        self.log_admin_action(
            "cluster_threshold_updated",
            cluster_id,
            false,
            performed_by,
            serde_json::json!({"old_threshold": old.threshold, "new_threshold": threshold}),
        )
        .await;

        self.get_cluster(cluster_id).await
    }

    pub async fn confirm_cluster(&self, cluster_id: Uuid, performed_by: &str) -> Result<ClusterDetail> {
        let cluster = self.catalog.get_cluster(cluster_id).await?;
        if !cluster.provisional {
            return Err(AdminError::InvalidRequest(format!("cluster {} is already confirmed", cluster.name)));
        }

        self.catalog.confirm_cluster(cluster_id).await?;

        self.log_admin_action("cluster_confirmed", cluster_id, false, performed_by, serde_json::json!({"cluster_name": cluster.name}))
            .await;

        self.get_cluster(cluster_id).await
    }

    // ---- statistics ----------------------------------------------------

    pub async fn cluster_statistics(&self) -> Result<ClusterStatistics> {
        let total_clusters = self.catalog.count_clusters(false).await?;
        let provisional_clusters = self.catalog.count_clusters(true).await?;
        let total_assets = self.catalog.count_assets().await?;
        let assets_in_clusters = self.catalog.count_clustered_assets().await?;

        Ok(ClusterStatistics {
            total_clusters,
            provisional_clusters,
            confirmed_clusters: total_clusters - provisional_clusters,
            total_assets,
            assets_in_clusters,
            unclustered_assets: total_assets - assets_in_clusters,
        })
    }

    /// Pairwise centroid similarity across all clusters with a centroid.
    /// O(n^2) in cluster count; fine at the scale this system expects
    /// clusters to exist at (hundreds, not millions).
    pub async fn identify_merge_candidates(&self, similarity_threshold: f64) -> Result<Vec<MergeCandidate>> {
        let clusters: Vec<Cluster> = self.catalog.list_clusters().await?.into_iter().filter(|c| c.centroid.is_some()).collect();

        let mut candidates = Vec::new();
        for (i, a) in clusters.iter().enumerate() {
            for b in &clusters[i + 1..] {
                let similarity = cosine_similarity(a.centroid.as_ref().unwrap(), b.centroid.as_ref().unwrap());
                if similarity >= similarity_threshold {
                    candidates.push(MergeCandidate {
                        cluster_a: a.id,
                        cluster_b: b.id,
                        similarity,
                    });
                }
            }
        }

        candidates.sort_by(|x, y| y.similarity.partial_cmp(&x.similarity).unwrap_or(std::cmp::Ordering::Equal));
        Ok(candidates)
    }
}
