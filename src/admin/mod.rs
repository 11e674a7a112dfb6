//! Human-in-the-loop review: schema approve/reject, cluster management,
//! and catalog-wide statistics.

pub mod error;
pub mod handlers;

pub use error::AdminError;
pub use handlers::{AdminHandlers, ClusterDetail, ClusterStatistics, ClusterSummary, MergeCandidate, SchemaSummary};
