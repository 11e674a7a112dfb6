//! Relational system of record: assets, jobs, schemas, clusters, lineage.

pub mod error;
pub mod migrations;
pub mod models;
pub mod store;
pub mod vector;

pub use error::{CatalogError, ErrorKind, Result};
pub use migrations::migrate;
pub use models::{
    Asset, AssetKind, AssetStatus, Cluster, Job, JobStatus, JobType, Lineage, RawAsset, SchemaDef,
    SchemaStatus, StorageChoice,
};
pub use store::CatalogStore;
pub use vector::{cosine_similarity, mean_unit_vector, normalize};

use sqlx::postgres::PgPoolOptions;

/// Builds a connection pool the way `casparian_db::pool` does: bounded size,
/// short acquire timeout so a saturated pool fails fast instead of piling up
/// callers.
pub async fn connect(database_url: &str, max_connections: u32, min_connections: u32) -> Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}
