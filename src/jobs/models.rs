use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::jobs::types::{JobStatus, JobType};
use crate::schema::scheduled_jobs;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = scheduled_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScheduledJob {
    pub id: Uuid,
    pub organization_id: String,
    pub job_type: JobType,
    pub schedule: String,
    pub config: JsonValue,
    pub status: JobStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    /// `None` means the job has never been scheduled and is due immediately
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<JsonValue>,
    /// Consecutive failed due cycles; reset on success
    pub error_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// Eligible for dispatch at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Active | JobStatus::Failed)
            && self.next_run_at.is_none_or(|next| next <= now)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduled_jobs)]
pub struct NewScheduledJob {
    pub id: Uuid,
    pub organization_id: String,
    pub job_type: JobType,
    pub schedule: String,
    pub config: JsonValue,
    pub status: JobStatus,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl NewScheduledJob {
    /// An ACTIVE job that has never run
    pub fn new(
        organization_id: impl Into<String>,
        job_type: JobType,
        schedule: impl Into<String>,
        config: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            job_type,
            schedule: schedule.into(),
            config,
            status: JobStatus::Active,
            next_run_at: None,
        }
    }

    pub fn with_next_run_at(mut self, next_run_at: DateTime<Utc>) -> Self {
        self.next_run_at = Some(next_run_at);
        self
    }
}

/// Fields written back once a due cycle finishes
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = scheduled_jobs)]
#[diesel(treat_none_as_null = true)]
pub struct JobCompletion {
    pub status: JobStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<JsonValue>,
    pub error_count: i32,
}
