//! One dispatch pass over the due jobs.
//!
//! For each due job: take its lock and claim it as RUNNING if it is still due,
//! run the retry loop, schedule the next occurrence, persist the outcome and
//! release the lock. Jobs are handled one after another; a failure of one job
//! never ends the pass.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use futures::FutureExt;
use serde::Serialize;

use crate::config::JobsConfig;
use crate::error::{AppError, AppResult};
use crate::jobs::cron::CronCalculator;
use crate::jobs::engine::ExecutionEngine;
use crate::jobs::error::JobError;
use crate::jobs::lock::LockManager;
use crate::jobs::models::{JobCompletion, ScheduledJob};
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::retry::{RetryController, RetryPolicy};
use crate::jobs::store::JobStore;
use crate::jobs::types::JobStatus;

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Lock held elsewhere, or no longer due once locked
    pub skipped: usize,
    /// Store failure or panic around the job; state may be stale
    pub errored: usize,
}

enum JobOutcome {
    Succeeded,
    Failed,
    /// Finished by another instance since the due list was read
    NoLongerDue,
}

#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    locks: LockManager,
    retry: RetryController,
    cron: CronCalculator,
    stale_after: TimeDelta,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        locks: LockManager,
        registry: Arc<HandlerRegistry>,
        config: &JobsConfig,
    ) -> Self {
        let engine = ExecutionEngine::new(
            registry,
            Duration::from_secs(config.execution_timeout_secs),
        );
        let retry = RetryController::new(engine, RetryPolicy::from(config));
        let cron = CronCalculator::new(Duration::from_secs(config.invalid_schedule_fallback_secs));
        let stale_after = TimeDelta::try_seconds(config.stale_running_after_secs as i64)
            .unwrap_or(TimeDelta::hours(1));

        Self {
            store,
            locks,
            retry,
            cron,
            stale_after,
        }
    }

    /// Reconcile stale jobs, then process due jobs
    pub async fn run_pass(&self) -> AppResult<PassSummary> {
        if let Err(e) = self.reconcile_stale_jobs().await {
            tracing::warn!(error = %e, "Stale job reconciliation failed");
        }
        self.process_due_jobs().await
    }

    /// Execute every job that is due now
    ///
    /// Only a failure to list the due jobs fails the pass.
    pub async fn process_due_jobs(&self) -> AppResult<PassSummary> {
        let due = self.store.find_due(Utc::now()).await?;
        let mut summary = PassSummary {
            due: due.len(),
            ..Default::default()
        };

        for job in due {
            if !self.locks.acquire(job.id).await {
                tracing::debug!(job_id = %job.id, "Job locked by another instance, skipping");
                summary.skipped += 1;
                continue;
            }

            let outcome = AssertUnwindSafe(self.process_job(&job)).catch_unwind().await;
            self.locks.release(job.id).await;

            match outcome {
                Ok(Ok(JobOutcome::Succeeded)) => summary.succeeded += 1,
                Ok(Ok(JobOutcome::Failed)) => summary.failed += 1,
                Ok(Ok(JobOutcome::NoLongerDue)) => summary.skipped += 1,
                Ok(Err(e)) => {
                    tracing::error!(job_id = %job.id, error = %e, "Job processing error");
                    summary.errored += 1;
                }
                Err(_) => {
                    tracing::error!(job_id = %job.id, "Job processing panicked");
                    summary.errored += 1;
                }
            }
        }

        tracing::info!(
            due = summary.due,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            errored = summary.errored,
            "Dispatch pass finished"
        );

        Ok(summary)
    }

    async fn process_job(&self, listed: &ScheduledJob) -> Result<JobOutcome, JobError> {
        // The listed record may predate a run that finished elsewhere
        let Some(job) = self.store.claim_due(listed.id, Utc::now()).await? else {
            tracing::debug!(job_id = %listed.id, "Job no longer due, skipping");
            return Ok(JobOutcome::NoLongerDue);
        };

        let report = self.retry.run_with_retry(&job).await;

        let now = Utc::now();
        let next_run_at = self.cron.next_run_time(&job.schedule, Some(now));
        let last_result = serde_json::to_value(&report.result)
            .map_err(|e| AppError::from(anyhow::Error::from(e)))?;

        let (status, error_count, outcome) = if report.is_success() {
            (JobStatus::Active, 0, JobOutcome::Succeeded)
        } else {
            (JobStatus::Failed, job.error_count.saturating_add(1), JobOutcome::Failed)
        };

        self.store
            .record_completion(
                job.id,
                JobCompletion {
                    status,
                    last_run_at: Some(now),
                    next_run_at: Some(next_run_at),
                    last_result: Some(last_result),
                    error_count,
                },
            )
            .await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            organization_id = %job.organization_id,
            status = %status,
            attempts = report.attempts,
            next_run_at = %next_run_at,
            "Job completed"
        );

        Ok(outcome)
    }

    /// Return jobs stuck in RUNNING to ACTIVE
    ///
    /// A job is only reset while this instance holds its lock, so an execution
    /// still running elsewhere keeps its state.
    pub async fn reconcile_stale_jobs(&self) -> AppResult<usize> {
        let threshold = Utc::now() - self.stale_after;
        let stale = self.store.find_stale_running(threshold).await?;

        let mut reset = 0;
        for job in stale {
            if !self.locks.acquire(job.id).await {
                tracing::debug!(job_id = %job.id, "Stale job still locked, leaving as is");
                continue;
            }

            let result = self.store.reset_to_active(job.id).await;
            self.locks.release(job.id).await;

            match result {
                Ok(()) => {
                    tracing::warn!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        running_since = %job.updated_at,
                        "Reset stale running job to active"
                    );
                    reset += 1;
                }
                Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Failed to reset stale job"),
            }
        }

        Ok(reset)
    }
}
