//! Single-process binary-heap queue backend: priority-ordered, retry-aware,
//! with an in-memory dead-letter sink. Matches the semantics of a
//! thread-safe priority queue, adapted to `tokio::sync::Mutex` + `BinaryHeap`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::interface::{backoff_seconds, Acknowledgement, QueueBackend, QueueMessage, Result};

/// Orders by `(-priority, created_at)` so that higher priority dequeues
/// first, and equal priority is FIFO by arrival time.
#[derive(Debug, Clone)]
struct Entry(QueueMessage);

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.created_at == other.0.created_at
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want highest priority and oldest
        // created_at to sort first.
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.created_at.cmp(&self.0.created_at))
    }
}

struct State {
    heap: BinaryHeap<Entry>,
    processing: HashMap<Uuid, QueueMessage>,
    dead_letter: HashMap<Uuid, QueueMessage>,
    closed: bool,
}

pub struct InProcessQueue {
    state: Mutex<State>,
    #[allow(dead_code)]
    default_max_retries: i32,
}

impl InProcessQueue {
    pub fn new(default_max_retries: i32) -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                processing: HashMap::new(),
                dead_letter: HashMap::new(),
                closed: false,
            }),
            default_max_retries,
        }
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.heap.clear();
    }

    pub async fn dlq_messages(&self) -> Vec<QueueMessage> {
        self.state.lock().await.dead_letter.values().cloned().collect()
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl QueueBackend for InProcessQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(super::interface::QueueError::Closed);
        }
        state.heap.push(Entry(message));
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(None);
        }

        // Pull entries off the heap, putting not-yet-ready retries back,
        // until we find one ready to claim or exhaust the heap.
        let mut deferred = Vec::new();
        let mut claimed = None;

        while let Some(Entry(message)) = state.heap.pop() {
            if let Some(next_retry_at) = message.next_retry_at {
                if next_retry_at > Utc::now() {
                    deferred.push(Entry(message));
                    continue;
                }
            }
            claimed = Some(message);
            break;
        }

        for entry in deferred {
            state.heap.push(entry);
        }

        if let Some(message) = &claimed {
            state.processing.insert(message.job_id, message.clone());
        }

        Ok(claimed)
    }

    async fn ack(&self, job_id: Uuid) -> Result<()> {
        self.state.lock().await.processing.remove(&job_id);
        Ok(())
    }

    async fn nack(&self, job_id: Uuid, error: &str, force: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(mut message) = state.processing.remove(&job_id) else {
            return Ok(false);
        };

        if !force && message.retry_count < message.max_retries {
            let backoff = backoff_seconds(message.retry_count);
            message.retry_count += 1;
            message.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(backoff));
            state.heap.push(Entry(message));
            Ok(false)
        } else {
            message.next_retry_at = None;
            state.dead_letter.insert(job_id, message);
            let _ = error;
            Ok(true)
        }
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.state.lock().await.heap.len())
    }

    async fn dlq_size(&self) -> Result<usize> {
        Ok(self.state.lock().await.dead_letter.len())
    }
}

/// Builds an `Acknowledgement` from a processor's outcome; shared helper
/// for the worker supervisor reporting results to callers/tests.
pub fn acknowledgement(job_id: Uuid, result: &std::result::Result<(), String>) -> Acknowledgement {
    match result {
        Ok(()) => Acknowledgement {
            job_id,
            success: true,
            error_message: None,
        },
        Err(e) => Acknowledgement {
            job_id,
            success: false,
            error_message: Some(e.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::interface::JobType;
    use serde_json::json;

    fn msg(priority: i32) -> QueueMessage {
        QueueMessage::new(Uuid::new_v4(), JobType::Json, json!({})).with_priority(priority)
    }

    #[tokio::test]
    async fn dequeues_highest_priority_first() {
        let q = InProcessQueue::default();
        q.enqueue(msg(1)).await.unwrap();
        q.enqueue(msg(5)).await.unwrap();
        q.enqueue(msg(3)).await.unwrap();

        let first = q.dequeue().await.unwrap().unwrap();
        assert_eq!(first.priority, 5);
    }

    #[tokio::test]
    async fn nack_retries_then_dead_letters() {
        let q = InProcessQueue::new(1);
        let message = QueueMessage::new(Uuid::new_v4(), JobType::Json, json!({}))
            .with_max_retries(1);
        let job_id = message.job_id;
        q.enqueue(message).await.unwrap();
        q.dequeue().await.unwrap();

        let dead_lettered = q.nack(job_id, "boom", false).await.unwrap();
        assert!(!dead_lettered);
        assert_eq!(q.dlq_size().await.unwrap(), 0);

        // Retried message has a future next_retry_at, so it won't dequeue yet.
        assert!(q.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nack_exhausting_retries_dead_letters() {
        let q = InProcessQueue::new(0);
        let message = QueueMessage::new(Uuid::new_v4(), JobType::Json, json!({})).with_max_retries(0);
        let job_id = message.job_id;
        q.enqueue(message).await.unwrap();
        q.dequeue().await.unwrap();

        let dead_lettered = q.nack(job_id, "boom", false).await.unwrap();
        assert!(dead_lettered);
        assert_eq!(q.dlq_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn forced_nack_dead_letters_despite_remaining_retries() {
        let q = InProcessQueue::new(5);
        let message = QueueMessage::new(Uuid::new_v4(), JobType::Json, json!({})).with_max_retries(5);
        let job_id = message.job_id;
        q.enqueue(message).await.unwrap();
        q.dequeue().await.unwrap();

        let dead_lettered = q.nack(job_id, "unrecoverable", true).await.unwrap();
        assert!(dead_lettered);
        assert_eq!(q.dlq_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ack_clears_processing_without_side_effects() {
        let q = InProcessQueue::default();
        let message = msg(0);
        let job_id = message.job_id;
        q.enqueue(message).await.unwrap();
        q.dequeue().await.unwrap();
        q.ack(job_id).await.unwrap();
        assert_eq!(q.size().await.unwrap(), 0);
        assert_eq!(q.dlq_size().await.unwrap(), 0);
    }
}
