use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Kind of work a scheduled job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::JobType")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ComplianceReport,
    GapAnalysis,
    RiskSummary,
    Housekeeping,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::ComplianceReport,
        JobType::GapAnalysis,
        JobType::RiskSummary,
        JobType::Housekeeping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ComplianceReport => "compliance_report",
            JobType::GapAnalysis => "gap_analysis",
            JobType::RiskSummary => "risk_summary",
            JobType::Housekeeping => "housekeeping",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown job type '{s}'"))
    }
}

/// Dispatch state of a scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::JobStatus")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Running,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Active => write!(f, "active"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one attempt, persisted as `last_result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub executed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn succeeded(data: JsonValue, duration_ms: u64, executed_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
            executed_at,
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: u64, executed_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
            executed_at,
        }
    }
}

/// Everything a handler sees about the job it runs
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub organization_id: String,
    pub job_type: JobType,
    pub config: JsonValue,
    /// 1-based attempt number within the current due cycle
    pub attempt: u32,
    /// Cancelled when the attempt times out
    pub cancellation_token: CancellationToken,
}

/// Value a handler reports when it ran to completion
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Success(JsonValue),
    /// The work was done but the result is negative; not retried
    Failure(String),
}

/// Why an attempt did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Handler returned `HandlerOutcome::Failure`
    Business,
    /// Handler returned an error or panicked
    Fault,
    Timeout,
    /// No handler for the job type
    Configuration,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Fault | FailureKind::Timeout)
    }
}

/// A single handler invocation as seen by the retry loop
#[derive(Debug, Clone)]
pub struct Attempt {
    pub result: JobResult,
    pub failure: Option<FailureKind>,
}

impl Attempt {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Business logic for one job type
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, ctx: JobContext) -> anyhow::Result<HandlerOutcome>;
}
