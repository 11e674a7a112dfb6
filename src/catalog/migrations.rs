//! Catalog bootstrap DDL, applied by the `migrate` CLI verb.
//!
//! This is deliberately a single idempotent script rather than a migrations
//! framework (out of scope per the core's Non-goals) — `CREATE TABLE IF NOT
//! EXISTS` / `CREATE INDEX IF NOT EXISTS` throughout.

use sqlx::PgPool;

use super::error::Result;

const BOOTSTRAP_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS asset_raw (
    id UUID PRIMARY KEY,
    request_id TEXT NOT NULL,
    part_id TEXT NOT NULL,
    uri TEXT NOT NULL,
    size_bytes BIGINT NOT NULL,
    content_type TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_asset_raw_request_id ON asset_raw (request_id);

CREATE TABLE IF NOT EXISTS schema_def (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    structure_hash TEXT NOT NULL UNIQUE,
    storage_choice TEXT NOT NULL,
    version INT NOT NULL DEFAULT 1,
    ddl TEXT,
    status TEXT NOT NULL DEFAULT 'provisional',
    sample_size INT,
    field_stability DOUBLE PRECISION,
    type_stability DOUBLE PRECISION,
    max_depth INT,
    top_level_keys INT,
    decision_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    reviewed_by TEXT,
    reviewed_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_schema_def_status ON schema_def (status);

CREATE TABLE IF NOT EXISTS cluster (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    centroid REAL[],
    threshold DOUBLE PRECISION NOT NULL DEFAULT 0.72,
    provisional BOOLEAN NOT NULL DEFAULT true,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_cluster_provisional ON cluster (provisional);

CREATE TABLE IF NOT EXISTS asset (
    id UUID PRIMARY KEY,
    kind TEXT NOT NULL,
    uri TEXT NOT NULL,
    sha256 TEXT,
    content_type TEXT,
    size_bytes BIGINT NOT NULL,
    owner TEXT,
    status TEXT NOT NULL DEFAULT 'queued',
    cluster_id UUID REFERENCES cluster (id),
    tags TEXT[],
    embedding REAL[],
    schema_id UUID REFERENCES schema_def (id),
    raw_asset_id UUID REFERENCES asset_raw (id),
    parent_asset_id UUID REFERENCES asset (id),
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_asset_kind ON asset (kind);
CREATE INDEX IF NOT EXISTS idx_asset_status ON asset (status);
CREATE INDEX IF NOT EXISTS idx_asset_owner ON asset (owner);
CREATE INDEX IF NOT EXISTS idx_asset_sha256 ON asset (sha256);
CREATE INDEX IF NOT EXISTS idx_asset_cluster_id ON asset (cluster_id);
CREATE INDEX IF NOT EXISTS idx_asset_schema_id ON asset (schema_id);

CREATE TABLE IF NOT EXISTS job (
    id UUID PRIMARY KEY,
    request_id TEXT NOT NULL UNIQUE,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    job_data JSONB NOT NULL,
    retry_count INT NOT NULL DEFAULT 0,
    max_retries INT NOT NULL DEFAULT 3,
    next_retry_at TIMESTAMPTZ,
    dead_letter BOOLEAN NOT NULL DEFAULT false,
    error_message TEXT,
    asset_ids UUID[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_job_status ON job (status);
CREATE INDEX IF NOT EXISTS idx_job_type ON job (job_type);
CREATE INDEX IF NOT EXISTS idx_job_dead_letter ON job (dead_letter);
CREATE INDEX IF NOT EXISTS idx_job_next_retry_at ON job (next_retry_at);

CREATE TABLE IF NOT EXISTS lineage (
    id UUID PRIMARY KEY,
    request_id TEXT NOT NULL,
    asset_id UUID REFERENCES asset (id) ON DELETE CASCADE,
    schema_id UUID REFERENCES schema_def (id),
    stage TEXT NOT NULL,
    detail JSONB,
    success BOOLEAN NOT NULL DEFAULT true,
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_lineage_request_id ON lineage (request_id);
CREATE INDEX IF NOT EXISTS idx_lineage_asset_id ON lineage (asset_id);
CREATE INDEX IF NOT EXISTS idx_lineage_stage ON lineage (stage);

CREATE TABLE IF NOT EXISTS queue_messages (
    job_id UUID PRIMARY KEY,
    job_type TEXT NOT NULL,
    job_data JSONB NOT NULL,
    priority INT NOT NULL DEFAULT 0,
    retry_count INT NOT NULL DEFAULT 0,
    max_retries INT NOT NULL DEFAULT 3,
    next_retry_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    state TEXT NOT NULL DEFAULT 'ready',
    started_at TIMESTAMPTZ,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_queue_messages_claim
    ON queue_messages (state, priority, created_at);
"#;

/// Applies the core catalog bootstrap DDL, plus DDL for every `active`
/// `SchemaDef` (covers reapplying after a fresh database).
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(BOOTSTRAP_DDL).execute(pool).await?;

    let active_ddl: Vec<(Option<String>,)> =
        sqlx::query_as("SELECT ddl FROM schema_def WHERE status = 'active' AND ddl IS NOT NULL")
            .fetch_all(pool)
            .await
            .unwrap_or_default();

    for (ddl,) in active_ddl {
        if let Some(ddl) = ddl {
            sqlx::raw_sql(&ddl).execute(pool).await?;
        }
    }

    tracing::info!("catalog migration complete");
    Ok(())
}
