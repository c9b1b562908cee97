//! Built-in job handlers.

mod report_service;

use std::sync::Arc;

pub use report_service::ReportServiceHandler;

use crate::config::ReportServiceConfig;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::types::JobType;

/// Registry routing every job type to the report service
pub fn default_registry(config: &ReportServiceConfig) -> anyhow::Result<HandlerRegistry> {
    let handler = Arc::new(ReportServiceHandler::new(config)?);
    let mut registry = HandlerRegistry::new();
    for job_type in JobType::ALL {
        registry.register(job_type, handler.clone());
    }
    Ok(registry)
}
