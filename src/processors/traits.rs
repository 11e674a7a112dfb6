//! The `Processor` trait job types implement, and the outcome they report.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub asset_ids: Vec<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ProcessError {
    pub fn message(&self) -> String {
        match self {
            ProcessError::Transient(m) | ProcessError::Permanent(m) => m.clone(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, ProcessError::Permanent(_))
    }
}

/// A job-type handler: given the `Job.job_data` payload, performs whatever
/// work the job type requires and reports the asset ids it touched.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, job_data: &serde_json::Value) -> Result<ProcessOutcome, ProcessError>;
}
