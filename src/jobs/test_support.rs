//! Fixtures shared by the engine, retry and orchestrator tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::models::ScheduledJob;
use crate::jobs::types::{HandlerOutcome, JobContext, JobHandler, JobStatus, JobType};

pub(crate) fn sample_job(job_type: JobType, next_run_at: Option<DateTime<Utc>>) -> ScheduledJob {
    let now = Utc::now();
    ScheduledJob {
        id: Uuid::new_v4(),
        organization_id: "org-acme".to_string(),
        job_type,
        schedule: "0 9 * * *".to_string(),
        config: serde_json::json!({"framework": "iso27001"}),
        status: JobStatus::Active,
        last_run_at: None,
        next_run_at,
        last_result: None,
        error_count: 0,
        created_at: now,
        updated_at: now,
    }
}

/// What a scripted handler does on one invocation
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Succeed(JsonValue),
    Fail(&'static str),
    Error(&'static str),
    Panic,
    /// Sleep, then succeed
    Delay(Duration),
}

/// Handler that replays steps in order, repeating the last one
pub(crate) struct ScriptedHandler {
    steps: Mutex<VecDeque<Step>>,
    last: Step,
    calls: AtomicU32,
    started_at: Mutex<Vec<Instant>>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl ScriptedHandler {
    pub(crate) fn always(step: Step) -> Self {
        Self::sequence(vec![step])
    }

    pub(crate) fn sequence(steps: Vec<Step>) -> Self {
        let last = steps.last().cloned().unwrap_or(Step::Succeed(JsonValue::Null));
        Self {
            steps: Mutex::new(steps.into()),
            last,
            calls: AtomicU32::new(0),
            started_at: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn started_at(&self) -> Vec<Instant> {
        self.started_at.lock().unwrap().clone()
    }

    pub(crate) fn tokens(&self) -> Vec<CancellationToken> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    async fn execute(&self, ctx: JobContext) -> anyhow::Result<HandlerOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started_at.lock().unwrap().push(Instant::now());
        self.tokens
            .lock()
            .unwrap()
            .push(ctx.cancellation_token.clone());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.clone());

        match step {
            Step::Succeed(data) => Ok(HandlerOutcome::Success(data)),
            Step::Fail(message) => Ok(HandlerOutcome::Failure(message.to_string())),
            Step::Error(message) => Err(anyhow::anyhow!(message)),
            Step::Panic => panic!("handler exploded"),
            Step::Delay(duration) => {
                tokio::time::sleep(duration).await;
                Ok(HandlerOutcome::Success(
                    serde_json::json!({"delayed_ms": duration.as_millis() as u64}),
                ))
            }
        }
    }
}
