//! Processes a batch of JSON documents: schema decision, find-or-create
//! schema definition, per-document asset materialization.

use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::catalog::{
    AssetStatus, CatalogStore, Lineage, SchemaDef, SchemaStatus,
    StorageChoice as CatalogStorageChoice,
};
use crate::schema::{DdlGenerator, DeciderConfig, SchemaDecider, SchemaDecision, StorageChoice};

use super::traits::{ProcessError, ProcessOutcome, Processor};

#[derive(Debug, Deserialize)]
pub struct JsonJobPayload {
    pub request_id: String,
    pub documents: Vec<serde_json::Value>,
    pub asset_ids: Vec<Uuid>,
    #[allow(dead_code)]
    pub owner: Option<String>,
    pub collection_name_hint: Option<String>,
}

pub struct JsonProcessor {
    catalog: CatalogStore,
    decider: SchemaDecider,
    ddl_generator: DdlGenerator,
    auto_migrate: bool,
}

impl JsonProcessor {
    pub fn new(catalog: CatalogStore, decider_config: DeciderConfig, auto_migrate: bool) -> Self {
        Self {
            catalog,
            decider: SchemaDecider::new(decider_config),
            ddl_generator: DdlGenerator::default(),
            auto_migrate,
        }
    }

    async fn log_lineage(
        &self,
        request_id: &str,
        schema_id: Option<Uuid>,
        stage: &str,
        detail: serde_json::Value,
        success: bool,
        error_message: Option<String>,
    ) {
        let lineage = Lineage {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            asset_id: None,
            schema_id,
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

    async fn find_or_create_schema(
        &self,
        decision: &SchemaDecision,
        collection_name_hint: Option<&str>,
    ) -> Result<SchemaDef, ProcessError> {
        let collection_name = self.decider.generate_collection_name(decision, collection_name_hint);

        let storage_choice = match decision.storage_choice {
            StorageChoice::Sql => CatalogStorageChoice::Sql,
            StorageChoice::Jsonb => CatalogStorageChoice::Jsonb,
        };

        let ddl = match decision.storage_choice {
            StorageChoice::Sql => self.ddl_generator.generate_table_ddl(&collection_name, decision, true),
            StorageChoice::Jsonb => self.ddl_generator.generate_jsonb_collection_ddl(&collection_name, true),
        };

        let status = if self.auto_migrate {
            SchemaStatus::Active
        } else {
            SchemaStatus::Provisional
        };

        let now = Utc::now();
        let candidate = SchemaDef {
            id: Uuid::new_v4(),
            name: collection_name,
            structure_hash: decision.structure_hash.clone(),
            storage_choice,
            version: 1,
            ddl: Some(ddl),
            status,
            sample_size: Some(decision.documents_analyzed as i32),
            field_stability: Some(decision.field_stability),
            type_stability: Some(decision.type_stability),
            max_depth: Some(decision.max_depth as i32),
            top_level_keys: Some(decision.top_level_keys as i32),
            decision_reason: Some(decision.reason.clone()),
            created_at: now,
            updated_at: now,
            reviewed_by: None,
            reviewed_at: None,
        };

        let (schema, created) = self
            .catalog
            .upsert_schema_by_fingerprint(&candidate)
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))?;

        if created && schema.status == SchemaStatus::Active {
            if let Some(ddl) = &schema.ddl {
                sqlx::raw_sql(ddl)
                    .execute(self.catalog.pool())
                    .await
                    .map_err(|e| ProcessError::Permanent(format!("failed to execute DDL: {e}")))?;
            }
        }

        Ok(schema)
    }

    fn document_uri(scheme: &str, collection: &str, hash: &str) -> String {
        format!("{scheme}://{collection}/{hash}")
    }
}

#[async_trait::async_trait]
impl Processor for JsonProcessor {
    async fn process(&self, job_data: &serde_json::Value) -> Result<ProcessOutcome, ProcessError> {
        let payload: JsonJobPayload = serde_json::from_value(job_data.clone())
            .map_err(|e| ProcessError::Permanent(format!("invalid json job payload: {e}")))?;

        self.log_lineage(
            &payload.request_id,
            None,
            "json_processing_start",
            serde_json::json!({"document_count": payload.documents.len()}),
            true,
            None,
        )
        .await;

        let decision = self.decider.decide(&payload.documents);

        self.log_lineage(
            &payload.request_id,
            None,
            "schema_analysis",
            serde_json::to_value(&decision).unwrap_or_default(),
            true,
            None,
        )
        .await;

        let schema = self
            .find_or_create_schema(&decision, payload.collection_name_hint.as_deref())
            .await?;

        self.log_lineage(
            &payload.request_id,
            Some(schema.id),
            "schema_ready",
            serde_json::json!({"schema_id": schema.id, "status": schema.status}),
            true,
            None,
        )
        .await;

        let scheme = match decision.storage_choice {
            StorageChoice::Sql => "sql",
            StorageChoice::Jsonb => "jsonb",
        };

        let asset_status = if schema.status == SchemaStatus::Active {
            AssetStatus::Done
        } else {
            AssetStatus::Queued
        };

        if payload.documents.len() != payload.asset_ids.len() {
            return Err(ProcessError::Permanent(format!(
                "document count {} does not match asset_ids count {}",
                payload.documents.len(),
                payload.asset_ids.len()
            )));
        }

        let mut tx = self
            .catalog
            .pool()
            .begin()
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))?;

        for (doc, asset_id) in payload.documents.iter().zip(payload.asset_ids.iter()) {
            let doc_json = serde_json::to_string(doc)
                .map_err(|e| ProcessError::Permanent(format!("failed to serialize document: {e}")))?;
            let hash = format!("{:x}", Sha256::digest(doc_json.as_bytes()));
            let uri = Self::document_uri(scheme, &schema.name, &hash);

            sqlx::query(
                r#"
                UPDATE asset
                SET uri = $2, sha256 = $3, content_type = 'application/json', size_bytes = $4,
                    schema_id = $5, status = $6, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(asset_id)
            .bind(&uri)
            .bind(&hash)
            .bind(doc_json.len() as i64)
            .bind(schema.id)
            .bind(asset_status)
            .execute(&mut *tx)
            .await
            .map_err(|e| ProcessError::Transient(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| ProcessError::Transient(e.to_string()))?;

        let asset_ids = payload.asset_ids.clone();

        self.log_lineage(
            &payload.request_id,
            Some(schema.id),
            "json_processing_complete",
            serde_json::json!({"asset_ids": asset_ids, "storage_choice": decision.storage_choice}),
            true,
            None,
        )
        .await;

        Ok(ProcessOutcome { asset_ids })
    }
}
