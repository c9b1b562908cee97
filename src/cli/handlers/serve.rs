//! Serve command handler
//!
//! Handles the serve command including dry-run validation and dispatcher startup.

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::jobs::CronCalculator;
use crate::server::Server;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    /// Create a new serve command handler
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the serve command
    ///
    /// With `dry_run` the configuration is validated and summarized, and no
    /// connection is opened.
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Dispatcher startup errors (if not dry-run)
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }

        Server::new(self.config.clone()).run().await
    }

    /// Validate configuration without starting the dispatcher
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;

        let jobs = &self.config.jobs;
        let next_tick = CronCalculator::upcoming(&jobs.dispatch_schedule, chrono::Utc::now(), 1)
            .map_err(|e| crate::error::AppError::Validation {
                field: "jobs.dispatch_schedule".to_string(),
                reason: e.to_string(),
            })?;

        println!("✓ Configuration is valid");
        println!("✓ Database URL is configured");
        println!(
            "✓ Dispatch schedule '{}' (next tick: {})",
            jobs.dispatch_schedule,
            next_tick
                .first()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );
        println!(
            "✓ Execution policy: timeout {}s, {} attempt(s), base delay {}ms",
            jobs.execution_timeout_secs, jobs.max_attempts, jobs.retry_base_delay_ms
        );
        println!(
            "✓ Lock store: {:?} (lease {}s, {})",
            self.config.lock.backend,
            self.config.lock.lease_seconds,
            if self.config.lock.strict {
                "strict"
            } else {
                "fail-open"
            }
        );
        println!("✓ Report service: {}", self.config.report_service.base_url);
        if !jobs.enabled {
            println!("! Job dispatch is disabled (jobs.enabled = false)");
        }
        for warning in self.config.warnings() {
            println!("! {warning}");
        }

        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &Settings {
        &self.config
    }
}
