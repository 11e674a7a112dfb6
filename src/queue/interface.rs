//! Queue message shapes and the `QueueBackend` trait shared by the
//! in-process and distributed implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Media,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub job_id: Uuid,
    pub job_type: JobType,
    pub job_data: serde_json::Value,
    /// Higher priority is processed first.
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QueueMessage {
    pub fn new(job_id: Uuid, job_type: JobType, job_data: serde_json::Value) -> Self {
        Self {
            job_id,
            job_type,
            job_data,
            priority: 0,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Acknowledgement {
    pub job_id: Uuid,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Queue backend contract: enqueue, claim-with-visibility-timeout-free
/// dequeue, ack/nack, and size introspection. Both the in-process and
/// distributed implementations guarantee a claimed message is visible to
/// exactly one dequeuer at a time.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn enqueue(&self, message: QueueMessage) -> Result<()>;

    /// Claims and returns the next ready message, or `None` if the queue is
    /// empty. Does not block — callers poll on an interval.
    async fn dequeue(&self) -> Result<Option<QueueMessage>>;

    async fn ack(&self, job_id: Uuid) -> Result<()>;

    /// Schedules a retry with exponential backoff if under `max_retries`,
    /// otherwise moves the message to the dead-letter sink. `force` skips
    /// the retry check entirely — a processor's permanent-failure signal,
    /// equivalent to setting `retry_count = max_retries` before nacking.
    /// Returns whether the message was dead-lettered.
    async fn nack(&self, job_id: Uuid, error: &str, force: bool) -> Result<bool>;

    async fn size(&self) -> Result<usize>;

    async fn dlq_size(&self) -> Result<usize>;
}

/// `backoff_seconds = 2^retry_count_before_increment`, matching the
/// original in-process queue's schedule exactly.
pub fn backoff_seconds(retry_count: i32) -> i64 {
    2_i64.saturating_pow(retry_count.max(0) as u32)
}
