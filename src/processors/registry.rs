//! Maps a job type string to its registered processor.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::Processor;

#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: impl Into<String>, processor: Arc<dyn Processor>) {
        self.processors.insert(job_type.into(), processor);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(job_type).cloned()
    }
}
