//! Check-schedule command handler
//!
//! Validates a cron expression and previews its next firings in UTC.

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::jobs::CronCalculator;

#[derive(Debug, Default)]
pub struct CheckScheduleCommandHandler;

impl CheckScheduleCommandHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, expression: &str, count: usize) -> AppResult<()> {
        let upcoming = self.preview(expression, Utc::now(), count)?;

        println!("✓ '{}' is a valid schedule", expression);
        println!("Next {} firing(s) (UTC):", upcoming.len());
        for at in upcoming {
            println!("  - {}", at.to_rfc3339());
        }

        Ok(())
    }

    fn preview(
        &self,
        expression: &str,
        from: DateTime<Utc>,
        count: usize,
    ) -> AppResult<Vec<DateTime<Utc>>> {
        CronCalculator::upcoming(expression, from, count).map_err(|e| AppError::Validation {
            field: "expression".to_string(),
            reason: e.to_string(),
        })
    }
}
