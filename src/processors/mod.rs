//! Typed job-type handlers: `json` wraps the schema analyzer/decider/DDL
//! generator plus catalog writes, `media` wraps the external media service.

pub mod json;
pub mod media;
pub mod registry;
pub mod traits;

pub use json::JsonProcessor;
pub use media::{DefaultMediaService, MediaAnalysis, MediaProcessor, MediaService};
pub use registry::ProcessorRegistry;
pub use traits::{ProcessError, ProcessOutcome, Processor};
