//! Observability stubs (metrics, tracing)

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters/gauges
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_retried: AtomicU64,
    jobs_dead_lettered: AtomicU64,
    schemas_approved: AtomicU64,
    schemas_rejected: AtomicU64,
    clusters_merged: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_accepted", "metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "metric incremented");
    }

    pub fn job_retried(&self) {
        self.jobs_retried.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_retried", "metric incremented");
    }

    pub fn job_dead_lettered(&self) {
        self.jobs_dead_lettered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_dead_lettered", "metric incremented");
    }

    pub fn schema_approved(&self) {
        self.schemas_approved.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "schemas_approved", "metric incremented");
    }

    pub fn schema_rejected(&self) {
        self.schemas_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "schemas_rejected", "metric incremented");
    }

    pub fn clusters_merged(&self) {
        self.clusters_merged.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "clusters_merged", "metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_retried: self.jobs_retried.load(Ordering::Relaxed),
            jobs_dead_lettered: self.jobs_dead_lettered.load(Ordering::Relaxed),
            schemas_approved: self.schemas_approved.load(Ordering::Relaxed),
            schemas_rejected: self.schemas_rejected.load(Ordering::Relaxed),
            clusters_merged: self.clusters_merged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_failed: u64,
    pub jobs_retried: u64,
    pub jobs_dead_lettered: u64,
    pub schemas_approved: u64,
    pub schemas_rejected: u64,
    pub clusters_merged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_accepted, 0);

        metrics.job_accepted();
        metrics.job_retried();
        metrics.job_dead_lettered();
        metrics.schema_approved();
        metrics.clusters_merged();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_accepted, 1);
        assert_eq!(snapshot.jobs_retried, 1);
        assert_eq!(snapshot.jobs_dead_lettered, 1);
        assert_eq!(snapshot.schemas_approved, 1);
        assert_eq!(snapshot.clusters_merged, 1);
    }
}
