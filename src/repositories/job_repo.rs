use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::jobs::models::{JobCompletion, NewScheduledJob, ScheduledJob};
use crate::jobs::store::JobStore;
use crate::jobs::types::JobStatus;
use crate::schema::scheduled_jobs;

type PgPooled<'a> = PooledConnection<'a, AsyncPgConnection>;

/// PostgreSQL-backed job store
#[derive(Clone)]
pub struct JobRepository {
    pool: AsyncDbPool,
}

impl JobRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> AppResult<PgPooled<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })
    }

    /// Map an update that touched no row to NotFound
    fn expect_one(id: Uuid, updated: usize) -> AppResult<()> {
        if updated == 0 {
            Err(AppError::NotFound {
                entity: "ScheduledJob".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduledJob>> {
        let mut conn = self.conn().await?;

        scheduled_jobs::table
            .filter(
                scheduled_jobs::status
                    .eq(JobStatus::Active)
                    .or(scheduled_jobs::status.eq(JobStatus::Failed)),
            )
            .filter(
                scheduled_jobs::next_run_at
                    .is_null()
                    .or(scheduled_jobs::next_run_at.le(now)),
            )
            .order((
                scheduled_jobs::next_run_at.asc().nulls_first(),
                scheduled_jobs::created_at.asc(),
            ))
            .select(ScheduledJob::as_select())
            .load(&mut conn)
            .await
            .map_err(|e| AppError::database("find due jobs", e))
    }

    async fn find_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduledJob>> {
        let mut conn = self.conn().await?;

        scheduled_jobs::table
            .filter(scheduled_jobs::status.eq(JobStatus::Running))
            .filter(scheduled_jobs::updated_at.lt(older_than))
            .select(ScheduledJob::as_select())
            .load(&mut conn)
            .await
            .map_err(|e| AppError::database("find stale running jobs", e))
    }

    async fn get(&self, id: Uuid) -> AppResult<ScheduledJob> {
        let mut conn = self.conn().await?;

        scheduled_jobs::table
            .find(id)
            .select(ScheduledJob::as_select())
            .first(&mut conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => AppError::NotFound {
                    entity: "ScheduledJob".to_string(),
                    field: "id".to_string(),
                    value: id.to_string(),
                },
                _ => AppError::database("get job", e),
            })
    }

    async fn create(&self, job: NewScheduledJob) -> AppResult<ScheduledJob> {
        let mut conn = self.conn().await?;

        diesel::insert_into(scheduled_jobs::table)
            .values(&job)
            .returning(ScheduledJob::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| AppError::database("create job", e))
    }

    async fn claim_due(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<ScheduledJob>> {
        let mut conn = self.conn().await?;

        // Conditional on the same predicate as find_due so a job finished elsewhere is left alone
        diesel::update(
            scheduled_jobs::table
                .find(id)
                .filter(
                    scheduled_jobs::status
                        .eq(JobStatus::Active)
                        .or(scheduled_jobs::status.eq(JobStatus::Failed)),
                )
                .filter(
                    scheduled_jobs::next_run_at
                        .is_null()
                        .or(scheduled_jobs::next_run_at.le(now)),
                ),
        )
        .set((
            scheduled_jobs::status.eq(JobStatus::Running),
            scheduled_jobs::updated_at.eq(diesel::dsl::now),
        ))
        .returning(ScheduledJob::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|e| AppError::database("claim due job", e))
    }

    async fn record_completion(&self, id: Uuid, completion: JobCompletion) -> AppResult<()> {
        let mut conn = self.conn().await?;

        let updated = diesel::update(scheduled_jobs::table.find(id))
            .set((&completion, scheduled_jobs::updated_at.eq(diesel::dsl::now)))
            .execute(&mut conn)
            .await
            .map_err(|e| AppError::database("record job completion", e))?;

        Self::expect_one(id, updated)
    }

    async fn reset_to_active(&self, id: Uuid) -> AppResult<()> {
        let mut conn = self.conn().await?;

        // Only a job still RUNNING is reset
        let updated = diesel::update(
            scheduled_jobs::table
                .find(id)
                .filter(scheduled_jobs::status.eq(JobStatus::Running)),
        )
        .set((
            scheduled_jobs::status.eq(JobStatus::Active),
            scheduled_jobs::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)
        .await
        .map_err(|e| AppError::database("reset job to active", e))?;

        Self::expect_one(id, updated)
    }
}
