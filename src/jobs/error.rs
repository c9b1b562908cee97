use thiserror::Error;

use crate::error::AppError;
use crate::jobs::lock::LockError;
use crate::jobs::types::JobType;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("No handler registered for job type '{0}'")]
    HandlerNotFound(JobType),

    #[error("Job execution timed out after {0}s")]
    Timeout(u64),

    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Lock store error: {0}")]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl JobError {
    pub fn invalid_cron(expression: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidCronExpression {
            expression: expression.into(),
            reason: reason.to_string(),
        }
    }
}
