use std::collections::HashMap;
use std::sync::Arc;

use crate::jobs::types::{JobHandler, JobType};

/// Maps job types to their handlers; built once at startup
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `job_type`, replacing any previous one
    pub fn register(&mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> &mut Self {
        if self.handlers.insert(job_type, handler).is_some() {
            tracing::debug!(job_type = %job_type, "Replaced job handler");
        }
        self
    }

    pub fn resolve(&self, job_type: JobType) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.handlers.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}
