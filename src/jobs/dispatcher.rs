//! Periodic trigger for dispatch passes.
//!
//! Wraps tokio-cron-scheduler with a single job firing on
//! `jobs.dispatch_schedule`. A tick that arrives while the previous pass is
//! still running is skipped.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::{AppError, AppResult};
use crate::jobs::cron::CronCalculator;
use crate::jobs::orchestrator::{JobOrchestrator, PassSummary};

pub struct Dispatcher {
    scheduler: JobScheduler,
}

impl Dispatcher {
    /// Register the dispatch job; nothing fires until [`Dispatcher::start`]
    pub async fn new(orchestrator: JobOrchestrator, schedule: &str) -> AppResult<Self> {
        let expression = CronCalculator::normalize(schedule).map_err(|e| AppError::Validation {
            field: "jobs.dispatch_schedule".to_string(),
            reason: e.to_string(),
        })?;

        let scheduler = JobScheduler::new().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        let gate = Arc::new(Mutex::new(()));
        let job = Job::new_async(expression.as_str(), move |_uuid, _lock| {
            let orchestrator = orchestrator.clone();
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                dispatch_tick(&orchestrator, &gate).await;
            })
        })
        .map_err(|e| AppError::Validation {
            field: "jobs.dispatch_schedule".to_string(),
            reason: format!("Invalid cron expression: {}", e),
        })?;

        scheduler.add(job).await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        tracing::info!(schedule = %expression, "Dispatch job registered");
        Ok(Self { scheduler })
    }

    pub async fn start(&self) -> AppResult<()> {
        self.scheduler.start().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })
    }

    /// Stop firing new ticks; a pass already in flight is dropped with the runtime
    pub async fn stop(mut self) -> AppResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })
    }
}

/// Run one pass unless another is still holding the gate
pub(crate) async fn dispatch_tick(
    orchestrator: &JobOrchestrator,
    gate: &Mutex<()>,
) -> Option<PassSummary> {
    let Ok(_running) = gate.try_lock() else {
        tracing::debug!("Previous dispatch pass still running, skipping tick");
        return None;
    };

    match orchestrator.run_pass().await {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch pass failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::jobs::lock::{LockManager, MemoryLockStore};
    use crate::jobs::registry::HandlerRegistry;
    use crate::jobs::store::MemoryJobStore;
    use crate::jobs::test_support::{ScriptedHandler, Step, sample_job};
    use crate::jobs::types::JobType;
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;

    fn orchestrator(store: Arc<MemoryJobStore>) -> JobOrchestrator {
        let mut registry = HandlerRegistry::new();
        registry.register(
            JobType::ComplianceReport,
            Arc::new(ScriptedHandler::always(Step::Succeed(serde_json::json!({"ok": true})))),
        );
        JobOrchestrator::new(
            store,
            LockManager::new(
                Arc::new(MemoryLockStore::new()),
                Duration::from_secs(300),
                false,
            ),
            Arc::new(registry),
            &JobsConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_tick_runs_a_pass() {
        let store = Arc::new(MemoryJobStore::new());
        store
            .insert(sample_job(
                JobType::ComplianceReport,
                Some(Utc::now() - TimeDelta::minutes(1)),
            ))
            .await;

        let summary = dispatch_tick(&orchestrator(store), &Mutex::new(()))
            .await
            .unwrap();
        assert_eq!(summary.due, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let store = Arc::new(MemoryJobStore::new());
        let gate = Mutex::new(());
        let _in_flight = gate.lock().await;

        assert!(dispatch_tick(&orchestrator(store), &gate).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_dispatch_schedule_rejected() {
        let store = Arc::new(MemoryJobStore::new());
        let result = Dispatcher::new(orchestrator(store), "every minute").await;
        assert!(matches!(
            result,
            Err(AppError::Validation { field, .. }) if field == "jobs.dispatch_schedule"
        ));
    }
}
