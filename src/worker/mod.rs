//! Background job processing: a fixed pool of polling loops that claim
//! queue messages, dispatch to the registered processor, and reconcile
//! retries/dead-lettering back onto the catalog.

pub mod error;
pub mod supervisor;

pub use error::WorkerError;
pub use supervisor::{WorkerConfig, WorkerSupervisor};
