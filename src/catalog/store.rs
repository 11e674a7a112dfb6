//! sqlx-backed persistence for the catalog entities.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::{CatalogError, Result};
use super::models::{Asset, Cluster, Job, Lineage, RawAsset, SchemaDef};

#[derive(Debug, Clone)]
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- raw assets + assets ---------------------------------------------

    /// Inserts a raw upload, its materialized placeholder asset, and the
    /// lineage entry marking it stored — one transaction, since a crash
    /// between them would otherwise leave an orphaned row either side.
    pub async fn insert_file_asset(&self, raw: &RawAsset, asset: &Asset, lineage: &Lineage) -> Result<(RawAsset, Asset)> {
        let mut tx = self.pool.begin().await?;

        let raw_row = sqlx::query_as::<_, RawAsset>(
            r#"
            INSERT INTO asset_raw (id, request_id, part_id, uri, size_bytes, content_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, request_id, part_id, uri, size_bytes, content_type, created_at
            "#,
        )
        .bind(raw.id)
        .bind(&raw.request_id)
        .bind(&raw.part_id)
        .bind(&raw.uri)
        .bind(raw.size_bytes)
        .bind(&raw.content_type)
        .bind(raw.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let asset_row = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO asset (
                id, kind, uri, sha256, content_type, size_bytes, owner, status,
                cluster_id, tags, embedding, schema_id, raw_asset_id, parent_asset_id,
                metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(asset.id)
        .bind(asset.kind)
        .bind(&asset.uri)
        .bind(&asset.sha256)
        .bind(&asset.content_type)
        .bind(asset.size_bytes)
        .bind(&asset.owner)
        .bind(asset.status)
        .bind(asset.cluster_id)
        .bind(&asset.tags)
        .bind(&asset.embedding)
        .bind(asset.schema_id)
        .bind(asset.raw_asset_id)
        .bind(asset.parent_asset_id)
        .bind(&asset.metadata)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        insert_lineage_row(&mut tx, lineage).await?;

        tx.commit().await?;
        Ok((raw_row, asset_row))
    }

    /// Inserts a placeholder asset for one JSON document plus its lineage
    /// entry, in a single transaction.
    pub async fn insert_json_asset(&self, asset: &Asset, lineage: &Lineage) -> Result<Asset> {
        let mut tx = self.pool.begin().await?;

        let asset_row = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO asset (
                id, kind, uri, sha256, content_type, size_bytes, owner, status,
                cluster_id, tags, embedding, schema_id, raw_asset_id, parent_asset_id,
                metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(asset.id)
        .bind(asset.kind)
        .bind(&asset.uri)
        .bind(&asset.sha256)
        .bind(&asset.content_type)
        .bind(asset.size_bytes)
        .bind(&asset.owner)
        .bind(asset.status)
        .bind(asset.cluster_id)
        .bind(&asset.tags)
        .bind(&asset.embedding)
        .bind(asset.schema_id)
        .bind(asset.raw_asset_id)
        .bind(asset.parent_asset_id)
        .bind(&asset.metadata)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        insert_lineage_row(&mut tx, lineage).await?;

        tx.commit().await?;
        Ok(asset_row)
    }

    pub async fn get_asset(&self, id: Uuid) -> Result<Asset> {
        sqlx::query_as::<_, Asset>("SELECT * FROM asset WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("asset {id}")))
    }

    pub async fn update_asset_status(&self, id: Uuid, status: super::models::AssetStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE asset SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("asset {id}")));
        }
        Ok(())
    }

    pub async fn assign_asset_cluster(&self, id: Uuid, cluster_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE asset SET cluster_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(cluster_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_assets_by_cluster(&self, cluster_id: Uuid) -> Result<Vec<Asset>> {
        sqlx::query_as::<_, Asset>("SELECT * FROM asset WHERE cluster_id = $1 ORDER BY created_at")
            .bind(cluster_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    // ---- jobs --------------------------------------------------------

    /// Creates a job and its "accepted" lineage entry in one transaction,
    /// respecting the `request_id` idempotency key. If a concurrent request
    /// already created a row with this key, the unique index raises a
    /// constraint violation here; the transaction is rolled back and the
    /// existing row is re-read and returned instead — the caller can't
    /// distinguish a fresh create from a race loss, by design.
    pub async fn create_job_with_lineage(&self, job: &Job, lineage: &Lineage) -> Result<(Job, bool)> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO job (
                id, request_id, job_type, status, job_data, retry_count, max_retries,
                next_retry_at, dead_letter, error_message, asset_ids,
                created_at, updated_at, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(&job.request_id)
        .bind(job.job_type)
        .bind(job.status)
        .bind(&job.job_data)
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.next_retry_at)
        .bind(job.dead_letter)
        .bind(&job.error_message)
        .bind(&job.asset_ids)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(row) => {
                insert_lineage_row(&mut tx, lineage).await?;
                tx.commit().await?;
                Ok((row, true))
            }
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                let existing = self.get_job_by_request_id(&job.request_id).await?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job> {
        sqlx::query_as::<_, Job>("SELECT * FROM job WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("job {id}")))
    }

    pub async fn get_job_by_request_id(&self, request_id: &str) -> Result<Job> {
        sqlx::query_as::<_, Job>("SELECT * FROM job WHERE request_id = $1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("job with request_id {request_id}")))
    }

    pub async fn mark_job_started(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE job SET status = 'processing', started_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_job_done(&self, id: Uuid, asset_ids: &[Uuid]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET status = 'done', asset_ids = $2, completed_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(asset_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_job_failed(
        &self,
        id: Uuid,
        error_message: &str,
        retry_count: i32,
        next_retry_at: Option<DateTime<Utc>>,
        dead_letter: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET status = $2, error_message = $3, retry_count = $4, next_retry_at = $5,
                dead_letter = $6, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(if dead_letter {
            super::models::JobStatus::Failed
        } else {
            super::models::JobStatus::Queued
        })
        .bind(error_message)
        .bind(retry_count)
        .bind(next_retry_at)
        .bind(dead_letter)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_dead_letter_jobs(&self) -> Result<Vec<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM job WHERE dead_letter ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    // ---- schema defs ---------------------------------------------------

    /// Atomic find-or-create on `structure_hash`. On a race loss (unique
    /// violation on insert), re-reads and returns the winning row instead.
    pub async fn upsert_schema_by_fingerprint(&self, schema: &SchemaDef) -> Result<(SchemaDef, bool)> {
        let inserted = sqlx::query_as::<_, SchemaDef>(
            r#"
            INSERT INTO schema_def (
                id, name, structure_hash, storage_choice, version, ddl, status,
                sample_size, field_stability, type_stability, max_depth, top_level_keys,
                decision_reason, created_at, updated_at, reviewed_by, reviewed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(schema.id)
        .bind(&schema.name)
        .bind(&schema.structure_hash)
        .bind(schema.storage_choice)
        .bind(schema.version)
        .bind(&schema.ddl)
        .bind(schema.status)
        .bind(schema.sample_size)
        .bind(schema.field_stability)
        .bind(schema.type_stability)
        .bind(schema.max_depth)
        .bind(schema.top_level_keys)
        .bind(&schema.decision_reason)
        .bind(schema.created_at)
        .bind(schema.updated_at)
        .bind(&schema.reviewed_by)
        .bind(schema.reviewed_at)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok((row, true)),
            Err(e) if is_unique_violation(&e) => {
                let existing = self.get_schema_by_fingerprint(&schema.structure_hash).await?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_schema(&self, id: Uuid) -> Result<SchemaDef> {
        sqlx::query_as::<_, SchemaDef>("SELECT * FROM schema_def WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("schema {id}")))
    }

    pub async fn get_schema_by_fingerprint(&self, structure_hash: &str) -> Result<SchemaDef> {
        sqlx::query_as::<_, SchemaDef>("SELECT * FROM schema_def WHERE structure_hash = $1")
            .bind(structure_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("schema with fingerprint {structure_hash}")))
    }

    pub async fn list_schemas(&self, status: Option<super::models::SchemaStatus>) -> Result<Vec<SchemaDef>> {
        match status {
            Some(status) => sqlx::query_as::<_, SchemaDef>(
                "SELECT * FROM schema_def WHERE status = $1 ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into),
            None => sqlx::query_as::<_, SchemaDef>("SELECT * FROM schema_def ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(Into::into),
        }
    }

    /// Activates a provisional schema and carries every asset already
    /// queued against it into processing, in one transaction.
    pub async fn approve_schema(&self, id: Uuid, reviewer: &str, ddl: &str) -> Result<SchemaDef> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, SchemaDef>(
            r#"
            UPDATE schema_def
            SET status = 'active', ddl = $3, reviewed_by = $2, reviewed_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reviewer)
        .bind(ddl)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("schema {id}")))?;

        sqlx::query("UPDATE asset SET status = 'processing', updated_at = now() WHERE schema_id = $1 AND status = 'queued'")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Rejects a provisional schema, recording the reviewer's reason, and
    /// fails every asset still queued against it, in one transaction.
    pub async fn reject_schema(&self, id: Uuid, reviewer: &str, reason: &str) -> Result<SchemaDef> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, SchemaDef>(
            r#"
            UPDATE schema_def
            SET status = 'rejected', decision_reason = $3, reviewed_by = $2, reviewed_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reviewer)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("schema {id}")))?;

        sqlx::query("UPDATE asset SET status = 'failed', updated_at = now() WHERE schema_id = $1 AND status = 'queued'")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    // ---- clusters --------------------------------------------------------

    pub async fn insert_cluster(&self, cluster: &Cluster) -> Result<Cluster> {
        sqlx::query_as::<_, Cluster>(
            r#"
            INSERT INTO cluster (id, name, centroid, threshold, provisional, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(cluster.id)
        .bind(&cluster.name)
        .bind(&cluster.centroid)
        .bind(cluster.threshold)
        .bind(cluster.provisional)
        .bind(&cluster.metadata)
        .bind(cluster.created_at)
        .bind(cluster.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn get_cluster(&self, id: Uuid) -> Result<Cluster> {
        sqlx::query_as::<_, Cluster>("SELECT * FROM cluster WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("cluster {id}")))
    }

    pub async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        sqlx::query_as::<_, Cluster>("SELECT * FROM cluster ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn rename_cluster(&self, id: Uuid, name: &str) -> Result<Cluster> {
        sqlx::query_as::<_, Cluster>(
            "UPDATE cluster SET name = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("cluster {id}")))
    }

    pub async fn update_cluster_threshold(&self, id: Uuid, threshold: f64) -> Result<Cluster> {
        sqlx::query_as::<_, Cluster>(
            "UPDATE cluster SET threshold = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(threshold)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("cluster {id}")))
    }

    pub async fn confirm_cluster(&self, id: Uuid) -> Result<Cluster> {
        sqlx::query_as::<_, Cluster>(
            "UPDATE cluster SET provisional = false, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("cluster {id}")))
    }

    /// Merges `source` into `target`: reassigns all of `source`'s assets,
    /// then deletes the now-empty cluster. Runs in a single transaction.
    pub async fn merge_clusters(&self, target: Uuid, source: Uuid) -> Result<Cluster> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE asset SET cluster_id = $1, updated_at = now() WHERE cluster_id = $2")
            .bind(target)
            .bind(source)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM cluster WHERE id = $1")
            .bind(source)
            .execute(&mut *tx)
            .await?;

        let merged = sqlx::query_as::<_, Cluster>("SELECT * FROM cluster WHERE id = $1")
            .bind(target)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("cluster {target}")))?;

        tx.commit().await?;
        Ok(merged)
    }

    // ---- lineage -----------------------------------------------------

    pub async fn record_lineage(&self, lineage: &Lineage) -> Result<Lineage> {
        sqlx::query_as::<_, Lineage>(
            r#"
            INSERT INTO lineage (id, request_id, asset_id, schema_id, stage, detail, success, error_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(lineage.id)
        .bind(&lineage.request_id)
        .bind(lineage.asset_id)
        .bind(lineage.schema_id)
        .bind(&lineage.stage)
        .bind(&lineage.detail)
        .bind(lineage.success)
        .bind(&lineage.error_message)
        .bind(lineage.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn list_lineage_for_request(&self, request_id: &str) -> Result<Vec<Lineage>> {
        sqlx::query_as::<_, Lineage>(
            "SELECT * FROM lineage WHERE request_id = $1 ORDER BY created_at",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    // ---- aggregate counts, for admin summaries ----------------------------

    pub async fn count_assets_by_schema(&self, schema_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM asset WHERE schema_id = $1")
            .bind(schema_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn count_clusters(&self, provisional_only: bool) -> Result<i64> {
        let row: (i64,) = if provisional_only {
            sqlx::query_as("SELECT count(*) FROM cluster WHERE provisional").fetch_one(&self.pool).await?
        } else {
            sqlx::query_as("SELECT count(*) FROM cluster").fetch_one(&self.pool).await?
        };
        Ok(row.0)
    }

    pub async fn count_assets(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM asset").fetch_one(&self.pool).await?;
        Ok(row.0)
    }

    pub async fn count_clustered_assets(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM asset WHERE cluster_id IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}

async fn insert_lineage_row(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, lineage: &Lineage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lineage (id, request_id, asset_id, schema_id, stage, detail, success, error_message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(lineage.id)
    .bind(&lineage.request_id)
    .bind(lineage.asset_id)
    .bind(lineage.schema_id)
    .bind(&lineage.stage)
    .bind(&lineage.detail)
    .bind(lineage.success)
    .bind(&lineage.error_message)
    .bind(lineage.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
