//! Persistence seam for scheduled jobs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::jobs::models::{JobCompletion, NewScheduledJob, ScheduledJob};
use crate::jobs::types::JobStatus;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// ACTIVE or FAILED jobs with `next_run_at <= now` or unset, earliest first
    /// with never-scheduled jobs ahead of all others
    async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledJob>>;

    /// RUNNING jobs last touched before `older_than`
    async fn find_stale_running(&self, older_than: DateTime<Utc>)
    -> AppResult<Vec<ScheduledJob>>;

    async fn get(&self, id: Uuid) -> AppResult<ScheduledJob>;

    async fn create(&self, job: NewScheduledJob) -> AppResult<ScheduledJob>;

    /// Move the job to RUNNING if it is still due at `now`, returning the
    /// record as stored. `None` when it is missing or no longer due.
    async fn claim_due(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<ScheduledJob>>;

    async fn record_completion(&self, id: Uuid, completion: JobCompletion) -> AppResult<()>;

    async fn reset_to_active(&self, id: Uuid) -> AppResult<()>;
}

pub(crate) fn not_found(id: Uuid) -> AppError {
    AppError::NotFound {
        entity: "ScheduledJob".to_string(),
        field: "id".to_string(),
        value: id.to_string(),
    }
}

/// Job records kept in process memory
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, ScheduledJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `job` as-is, replacing a record with the same id
    pub async fn insert(&self, job: ScheduledJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut ScheduledJob) + Send,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| not_found(id))?;
        apply(job);
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledJob>> {
        let jobs = self.jobs.read().await;
        let mut due: Vec<ScheduledJob> = jobs.values().filter(|j| j.is_due(now)).cloned().collect();
        // Option orders None before Some
        due.sort_by_key(|j| (j.next_run_at, j.created_at, j.id));
        Ok(due)
    }

    async fn find_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduledJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| j.status == JobStatus::Running && j.updated_at < older_than)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> AppResult<ScheduledJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, job: NewScheduledJob) -> AppResult<ScheduledJob> {
        let now = Utc::now();
        let record = ScheduledJob {
            id: job.id,
            organization_id: job.organization_id,
            job_type: job.job_type,
            schedule: job.schedule,
            config: job.config,
            status: job.status,
            last_run_at: None,
            next_run_at: job.next_run_at,
            last_result: None,
            error_count: 0,
            created_at: now,
            updated_at: now,
        };

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.id) {
            return Err(AppError::Validation {
                field: "id".to_string(),
                reason: format!("Job {} already exists", record.id),
            });
        }
        jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn claim_due(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<ScheduledJob>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id).filter(|job| job.is_due(now)) else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn record_completion(&self, id: Uuid, completion: JobCompletion) -> AppResult<()> {
        self.update(id, move |job| {
            job.status = completion.status;
            job.last_run_at = completion.last_run_at;
            job.next_run_at = completion.next_run_at;
            job.last_result = completion.last_result;
            job.error_count = completion.error_count;
        })
        .await
    }

    async fn reset_to_active(&self, id: Uuid) -> AppResult<()> {
        self.update(id, |job| job.status = JobStatus::Active).await
    }
}
