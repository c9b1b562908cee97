//! Runs a single handler attempt under a hard timeout.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::jobs::error::JobError;
use crate::jobs::models::ScheduledJob;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::types::{Attempt, FailureKind, HandlerOutcome, JobContext, JobResult};

type HandlerReport = Result<anyhow::Result<HandlerOutcome>, Box<dyn Any + Send>>;

#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<HandlerRegistry>,
    timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<HandlerRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Run one attempt of `job`
    ///
    /// The handler runs on its own task and reports through a oneshot
    /// channel. When the timeout elapses first the receiver is dropped, the
    /// context token is cancelled and the task aborted, so a late result has
    /// nowhere to go.
    pub async fn execute(&self, job: &ScheduledJob, attempt: u32) -> Attempt {
        let executed_at = Utc::now();
        let started = Instant::now();

        let Some(handler) = self.registry.resolve(job.job_type) else {
            let error = JobError::HandlerNotFound(job.job_type);
            tracing::error!(
                job_id = %job.id,
                job_type = %job.job_type,
                error = %error,
                "Job type has no handler"
            );
            return Attempt {
                result: JobResult::failed(error.to_string(), 0, executed_at),
                failure: Some(FailureKind::Configuration),
            };
        };

        let token = CancellationToken::new();
        let ctx = JobContext {
            job_id: job.id,
            organization_id: job.organization_id.clone(),
            job_type: job.job_type,
            config: job.config.clone(),
            attempt,
            cancellation_token: token.clone(),
        };

        let (tx, rx) = oneshot::channel::<HandlerReport>();
        let task = tokio::spawn(async move {
            let report = AssertUnwindSafe(handler.execute(ctx)).catch_unwind().await;
            // Receiver is gone once the attempt timed out
            let _ = tx.send(report);
        });

        let received = tokio::select! {
            biased;
            received = rx => Some(received),
            _ = tokio::time::sleep(self.timeout) => None,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (result, failure) = match received {
            Some(Ok(Ok(Ok(HandlerOutcome::Success(data))))) => {
                (JobResult::succeeded(data, duration_ms, executed_at), None)
            }
            Some(Ok(Ok(Ok(HandlerOutcome::Failure(message))))) => (
                JobResult::failed(message, duration_ms, executed_at),
                Some(FailureKind::Business),
            ),
            Some(Ok(Ok(Err(e)))) => (
                JobResult::failed(format!("{e:#}"), duration_ms, executed_at),
                Some(FailureKind::Fault),
            ),
            Some(Ok(Err(panic))) => {
                let error = JobError::ExecutionFailed(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                ));
                (
                    JobResult::failed(error.to_string(), duration_ms, executed_at),
                    Some(FailureKind::Fault),
                )
            }
            Some(Err(_)) => {
                let error =
                    JobError::ExecutionFailed("handler task ended without a result".to_string());
                (
                    JobResult::failed(error.to_string(), duration_ms, executed_at),
                    Some(FailureKind::Fault),
                )
            }
            None => {
                token.cancel();
                task.abort();
                let error = JobError::Timeout(self.timeout.as_secs());
                (
                    JobResult::failed(error.to_string(), duration_ms, executed_at),
                    Some(FailureKind::Timeout),
                )
            }
        };

        match failure {
            None => tracing::debug!(
                job_id = %job.id,
                job_type = %job.job_type,
                attempt,
                duration_ms,
                "Attempt succeeded"
            ),
            Some(kind) => tracing::warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                organization_id = %job.organization_id,
                attempt,
                duration_ms,
                failure = ?kind,
                error = result.error.as_deref().unwrap_or_default(),
                "Attempt failed"
            ),
        }

        Attempt { result, failure }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
