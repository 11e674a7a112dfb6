//! Fixed-size worker pool: poll the queue, route by job type, reconcile
//! the catalog's job row with the queue's retry bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::catalog::CatalogStore;
use crate::observability::Metrics;
use crate::processors::{ProcessError, ProcessorRegistry};
use crate::queue::{backoff_seconds, JobType as QueueJobType, QueueBackend, QueueMessage};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub num_workers: usize,
    pub poll_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            poll_interval_ms: 250,
            shutdown_timeout_ms: 10_000,
        }
    }
}

/// Drives a fixed pool of polling loops against a shared queue and catalog.
/// Each loop claims one message at a time; there is no per-worker queue
/// partitioning, matching the original thread-pool design.
pub struct WorkerSupervisor {
    queue: Arc<dyn QueueBackend>,
    catalog: CatalogStore,
    processors: Arc<ProcessorRegistry>,
    metrics: Arc<Metrics>,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

fn job_type_key(job_type: QueueJobType) -> &'static str {
    match job_type {
        QueueJobType::Media => "media",
        QueueJobType::Json => "json",
    }
}

impl WorkerSupervisor {
    pub fn new(
        queue: Arc<dyn QueueBackend>,
        catalog: CatalogStore,
        processors: ProcessorRegistry,
        metrics: Arc<Metrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            catalog,
            processors: Arc::new(processors),
            metrics,
            config,
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Spawns `config.num_workers` polling loops as tokio tasks.
    pub fn spawn(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("worker supervisor already running");
            return;
        }

        tracing::info!(num_workers = self.config.num_workers, "starting worker pool");

        for i in 0..self.config.num_workers {
            let queue = self.queue.clone();
            let catalog = self.catalog.clone();
            let processors = self.processors.clone();
            let metrics = self.metrics.clone();
            let running = self.running.clone();
            let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
            let worker_name = format!("worker-{}", i + 1);

            let handle = tokio::spawn(async move {
                tracing::info!(worker = %worker_name, "worker started");
                while running.load(Ordering::SeqCst) {
                    match queue.dequeue().await {
                        Ok(Some(message)) => {
                            process_job(&queue, &catalog, &processors, &metrics, &worker_name, message).await;
                        }
                        Ok(None) => tokio::time::sleep(poll_interval).await,
                        Err(e) => {
                            tracing::error!(worker = %worker_name, error = %e, "error polling queue");
                            tokio::time::sleep(poll_interval).await;
                        }
                    }
                }
                tracing::info!(worker = %worker_name, "worker stopped");
            });

            self.handles.push(handle);
        }
    }

    /// Signals all loops to exit after their current iteration, then waits
    /// up to `timeout` for each to finish its in-flight job. A loop still
    /// running past the deadline is abandoned with a warning; its task is
    /// not aborted, so the job it holds can still complete and be acked.
    pub async fn stop(&mut self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);

        for (i, handle) in std::mem::take(&mut self.handles).into_iter().enumerate() {
            let worker_name = format!("worker-{}", i + 1);
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(worker = %worker_name, error = %e, "worker task panicked while stopping"),
                Err(_) => tracing::warn!(worker = %worker_name, timeout_ms = timeout.as_millis() as u64, "worker did not stop within timeout"),
            }
        }
    }
}

/// Processes a single claimed message end to end: mark the job row
/// started, dispatch to the registered processor, then reconcile success
/// or failure back onto both the catalog row and the queue.
async fn process_job(
    queue: &Arc<dyn QueueBackend>,
    catalog: &CatalogStore,
    processors: &ProcessorRegistry,
    metrics: &Metrics,
    worker_name: &str,
    message: QueueMessage,
) {
    let job_id = message.job_id;
    tracing::info!(worker = %worker_name, job_id = %job_id, job_type = job_type_key(message.job_type), "processing job");

    if let Err(e) = catalog.mark_job_started(job_id).await {
        tracing::error!(job_id = %job_id, error = %e, "failed to mark job started");
        return;
    }

    let Some(processor) = processors.get(job_type_key(message.job_type)) else {
        let error = format!("no processor registered for job type {}", job_type_key(message.job_type));
        tracing::error!(job_id = %job_id, %error, "no processor for job type");
        fail_job(queue, catalog, metrics, job_id, &error, message.retry_count, message.max_retries, true).await;
        return;
    };

    match processor.process(&message.job_data).await {
        Ok(outcome) => {
            if let Err(e) = catalog.mark_job_done(job_id, &outcome.asset_ids).await {
                tracing::error!(job_id = %job_id, error = %e, "failed to mark job done");
                return;
            }
            if let Err(e) = queue.ack(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "failed to ack job");
            }
            tracing::info!(worker = %worker_name, job_id = %job_id, "job completed");
        }
        Err(err) => {
            let force = err.is_permanent();
            let error_message = err.message();
            tracing::warn!(worker = %worker_name, job_id = %job_id, error = %error_message, "job processing failed");
            fail_job(queue, catalog, metrics, job_id, &error_message, message.retry_count, message.max_retries, force).await;
        }
    }
}

/// Nacks the queue, then syncs the queue's post-nack state back onto the
/// job row. `retry_count`/`max_retries` are the pre-nack, dequeue-time
/// values; after a non-forced nack the queue has incremented its own
/// counter by one, so the job row is updated to match using
/// `backoff_seconds` keyed by the pre-increment count (mirrors the queue's
/// own `2^retry_count` schedule applied before it bumped the counter).
#[allow(clippy::too_many_arguments)]
async fn fail_job(
    queue: &Arc<dyn QueueBackend>,
    catalog: &CatalogStore,
    metrics: &Metrics,
    job_id: Uuid,
    error_message: &str,
    retry_count: i32,
    max_retries: i32,
    force: bool,
) {
    let dead_lettered = match queue.nack(job_id, error_message, force).await {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "failed to nack job");
            return;
        }
    };

    metrics.job_failed();
    if dead_lettered {
        metrics.job_dead_lettered();
    } else {
        metrics.job_retried();
    }

    let new_retry_count = if dead_lettered { max_retries } else { retry_count + 1 };
    let next_retry_at = if dead_lettered {
        None
    } else {
        Some(Utc::now() + chrono::Duration::seconds(backoff_seconds(retry_count)))
    };

    if let Err(e) = catalog
        .mark_job_failed(job_id, error_message, new_retry_count, next_retry_at, dead_lettered)
        .await
    {
        tracing::error!(job_id = %job_id, error = %e, "failed to sync job failure to catalog");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::ProcessOutcome;
    use crate::queue::InProcessQueue;
    use async_trait::async_trait;

    struct AlwaysFails;

    #[async_trait]
    impl crate::processors::Processor for AlwaysFails {
        async fn process(&self, _job_data: &serde_json::Value) -> Result<ProcessOutcome, ProcessError> {
            Err(ProcessError::Permanent("nope".to_string()))
        }
    }

    #[tokio::test]
    async fn job_type_key_round_trips() {
        assert_eq!(job_type_key(QueueJobType::Media), "media");
        assert_eq!(job_type_key(QueueJobType::Json), "json");
    }

    /// With an empty queue, every polling loop is parked in its idle sleep;
    /// `stop` should flip `running` and return well within the timeout
    /// instead of leaking the handles.
    #[tokio::test]
    async fn stop_returns_promptly_when_workers_are_idle() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/mammothbox_unused")
            .unwrap();
        let queue: Arc<dyn QueueBackend> = Arc::new(InProcessQueue::new(3));
        let catalog = CatalogStore::new(pool);
        let metrics = Arc::new(Metrics::new());
        let config = WorkerConfig {
            num_workers: 2,
            poll_interval_ms: 5,
            shutdown_timeout_ms: 1_000,
        };

        let mut supervisor = WorkerSupervisor::new(queue, catalog, ProcessorRegistry::new(), metrics, config);
        supervisor.spawn();
        assert_eq!(supervisor.handles.len(), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.stop(Duration::from_secs(1)).await;

        assert!(supervisor.handles.is_empty());
    }

    #[tokio::test]
    async fn unregistered_job_type_dead_letters_via_forced_nack() {
        let queue: Arc<dyn QueueBackend> = Arc::new(InProcessQueue::new(3));
        let message = QueueMessage::new(Uuid::new_v4(), QueueJobType::Json, serde_json::json!({}));
        let job_id = message.job_id;
        queue.enqueue(message.clone()).await.unwrap();
        queue.dequeue().await.unwrap();

        let registry = ProcessorRegistry::new();
        assert!(registry.get("json").is_none());

        let dead_lettered = queue.nack(job_id, "no processor registered for job type json", true).await.unwrap();
        assert!(dead_lettered);
        assert_eq!(queue.dlq_size().await.unwrap(), 1);
    }
}
