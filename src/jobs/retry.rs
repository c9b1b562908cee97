//! Bounded retry with exponential backoff around the execution engine.

use std::time::Duration;

use crate::config::JobsConfig;
use crate::jobs::engine::ExecutionEngine;
use crate::jobs::models::ScheduledJob;
use crate::jobs::types::{FailureKind, JobResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&JobsConfig> for RetryPolicy {
    fn from(config: &JobsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Pause after failed attempt `attempt` (1-based): `base * 2^(attempt - 1)`
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Final outcome of one due cycle
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub result: JobResult,
    pub attempts: u32,
    /// Failure of the last attempt; `None` on success
    pub failure: Option<FailureKind>,
}

impl RetryReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Clone)]
pub struct RetryController {
    engine: ExecutionEngine,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(engine: ExecutionEngine, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    /// Run attempts sequentially until one succeeds, a non-retryable failure
    /// occurs, or the attempt budget is spent
    pub async fn run_with_retry(&self, job: &ScheduledJob) -> RetryReport {
        let mut attempt = 1;
        loop {
            let outcome = self.engine.execute(job, attempt).await;

            let retry = match outcome.failure {
                None => false,
                Some(kind) => kind.is_retryable() && attempt < self.policy.max_attempts,
            };

            if !retry {
                if let Some(kind) = outcome.failure {
                    tracing::error!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        organization_id = %job.organization_id,
                        attempts = attempt,
                        failure = ?kind,
                        error = outcome.result.error.as_deref().unwrap_or_default(),
                        "Job failed"
                    );
                }
                return RetryReport {
                    result: outcome.result,
                    attempts: attempt,
                    failure: outcome.failure,
                };
            }

            let delay = self.policy.backoff_after(attempt);
            tracing::debug!(
                job_id = %job.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying job after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::registry::HandlerRegistry;
    use crate::jobs::test_support::{ScriptedHandler, Step, sample_job};
    use crate::jobs::types::JobType;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn controller(handler: Arc<ScriptedHandler>, timeout: Duration) -> RetryController {
        let mut registry = HandlerRegistry::new();
        registry.register(JobType::RiskSummary, handler);
        let engine = ExecutionEngine::new(Arc::new(registry), timeout);
        RetryController::new(engine, RetryPolicy::default())
    }

    #[test]
    fn test_default_backoff_is_one_then_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_policy_from_config() {
        let config = JobsConfig {
            max_attempts: 5,
            retry_base_delay_ms: 250,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff_after(3), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_fault_uses_whole_budget_with_backoff() {
        let handler = Arc::new(ScriptedHandler::always(Step::Error("database unavailable")));
        let retry = controller(handler.clone(), Duration::from_secs(300));
        let job = sample_job(JobType::RiskSummary, None);
        let started = Instant::now();

        let report = retry.run_with_retry(&job).await;

        assert_eq!(report.attempts, 3);
        assert_eq!(handler.calls(), 3);
        assert_eq!(report.failure, Some(FailureKind::Fault));
        assert!(!report.result.success);

        let starts = handler.started_at();
        assert_eq!(starts[1] - starts[0], Duration::from_secs(1));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(2));
        // No pause after the final attempt
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let handler = Arc::new(ScriptedHandler::sequence(vec![
            Step::Error("flaky"),
            Step::Succeed(serde_json::json!({"score": 87})),
            Step::Error("never reached"),
        ]));
        let retry = controller(handler.clone(), Duration::from_secs(300));

        let report = retry.run_with_retry(&sample_job(JobType::RiskSummary, None)).await;

        assert!(report.is_success());
        assert_eq!(report.attempts, 2);
        assert_eq!(handler.calls(), 2);
        assert_eq!(report.result.data, Some(serde_json::json!({"score": 87})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_business_failure_is_not_retried() {
        let handler = Arc::new(ScriptedHandler::always(Step::Fail("framework not enabled")));
        let retry = controller(handler.clone(), Duration::from_secs(300));

        let report = retry.run_with_retry(&sample_job(JobType::RiskSummary, None)).await;

        assert_eq!(report.attempts, 1);
        assert_eq!(handler.calls(), 1);
        assert_eq!(report.failure, Some(FailureKind::Business));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_failure_is_not_retried() {
        let handler = Arc::new(ScriptedHandler::always(Step::Succeed(serde_json::json!({}))));
        let retry = controller(handler.clone(), Duration::from_secs(300));
        let started = Instant::now();

        let report = retry.run_with_retry(&sample_job(JobType::GapAnalysis, None)).await;

        assert_eq!(report.attempts, 1);
        assert_eq!(report.failure, Some(FailureKind::Configuration));
        assert_eq!(handler.calls(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried() {
        let handler = Arc::new(ScriptedHandler::always(Step::Delay(Duration::from_secs(60))));
        let retry = controller(handler.clone(), Duration::from_secs(10));
        let started = Instant::now();

        let report = retry.run_with_retry(&sample_job(JobType::RiskSummary, None)).await;

        assert_eq!(report.attempts, 3);
        assert_eq!(report.failure, Some(FailureKind::Timeout));
        assert_eq!(
            report.result.error.as_deref(),
            Some("Job execution timed out after 10s")
        );
        assert_eq!(started.elapsed(), Duration::from_secs(10 + 1 + 10 + 2 + 10));
    }

    proptest! {
        #[test]
        fn property_backoff_doubles(base_ms in 1u64..10_000, attempt in 1u32..10) {
            let policy = RetryPolicy {
                max_attempts: 10,
                base_delay: Duration::from_millis(base_ms),
            };
            prop_assert_eq!(policy.backoff_after(attempt + 1), policy.backoff_after(attempt) * 2);
            prop_assert_eq!(policy.backoff_after(1), Duration::from_millis(base_ms));
        }
    }
}
