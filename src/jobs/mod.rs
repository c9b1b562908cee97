//! Scheduled job execution engine.
//!
//! Jobs are persisted records with a cron schedule. A dispatch pass finds the
//! due ones and runs each under a cross-instance lock, a per-attempt timeout
//! and a bounded retry budget, then records the outcome and the next run.

pub mod cron;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod lock;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::cron::CronCalculator;
pub use dispatcher::Dispatcher;
pub use engine::ExecutionEngine;
pub use error::JobError;
pub use lock::{LockManager, LockStore};
pub use models::{JobCompletion, NewScheduledJob, ScheduledJob};
pub use orchestrator::{JobOrchestrator, PassSummary};
pub use registry::HandlerRegistry;
pub use retry::{RetryController, RetryPolicy, RetryReport};
pub use store::{JobStore, MemoryJobStore};
pub use types::{
    Attempt, FailureKind, HandlerOutcome, JobContext, JobHandler, JobResult, JobStatus, JobType,
};
