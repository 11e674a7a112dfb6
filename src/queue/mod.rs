//! Job queue: priority ordering, retry with exponential backoff, dead-letter
//! sink. `inproc` for single-process deployments, `distributed` for
//! multi-worker deployments sharing the catalog database.

pub mod distributed;
pub mod inproc;
pub mod interface;

pub use distributed::DistributedQueue;
pub use inproc::InProcessQueue;
pub use interface::{
    backoff_seconds, Acknowledgement, JobType, QueueBackend, QueueError, QueueMessage, Result,
};
