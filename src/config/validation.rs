//! Configuration validation logic
//!
//! This module provides validation methods for all configuration structures
//! to ensure configuration values are within acceptable ranges and formats.

use crate::config::environment::Environment;
use crate::config::error::ConfigError;
use crate::config::settings::{
    DatabaseConfig, FileSettings, JobsConfig, LockBackend, LockConfig, LoggerSettings,
    ReportServiceConfig, Settings,
};
use crate::jobs::cron::CronCalculator;

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty and must be a PostgreSQL URL
    /// - Max and min connections must be greater than 0
    /// - Min connections must not exceed max connections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a valid database connection string.",
            ));
        }

        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationError {
                field: "database.min_connections".to_string(),
                message: format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            });
        }

        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "Log file path cannot be empty when file output is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        if self.rotation.max_size == 0 || self.rotation.max_files == 0 {
            return Err(ConfigError::validation(
                "logger.file.rotation",
                "Rotation max_size and max_files must be greater than 0.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl JobsConfig {
    /// Validate dispatcher configuration
    ///
    /// # Validation Rules
    /// - The dispatch schedule must be a valid cron expression
    /// - Timeout, attempt budget and fallback interval must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = CronCalculator::validate(&self.dispatch_schedule) {
            return Err(ConfigError::ValidationError {
                field: "jobs.dispatch_schedule".to_string(),
                message: e.to_string(),
            });
        }

        if self.execution_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "jobs.execution_timeout_secs",
                "Execution timeout must be greater than 0 seconds.",
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::validation(
                "jobs.max_attempts",
                "At least one attempt per due cycle is required.",
            ));
        }

        if self.max_attempts > 10 {
            return Err(ConfigError::validation(
                "jobs.max_attempts",
                "Max attempts cannot exceed 10; backoff would outlive the lock lease.",
            ));
        }

        if self.invalid_schedule_fallback_secs == 0 {
            return Err(ConfigError::validation(
                "jobs.invalid_schedule_fallback_secs",
                "Fallback interval must be greater than 0 seconds.",
            ));
        }

        if self.stale_running_after_secs == 0 {
            return Err(ConfigError::validation(
                "jobs.stale_running_after_secs",
                "Stale threshold must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl LockConfig {
    /// Validate lock store configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_seconds == 0 {
            return Err(ConfigError::validation(
                "lock.lease_seconds",
                "Lock lease must be greater than 0 seconds.",
            ));
        }

        if self.backend == LockBackend::Redis {
            let url = &self.redis.url;
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(ConfigError::validation(
                    "lock.redis.url",
                    "Invalid Redis URL. Expected format: redis://host[:port][/db]",
                ));
            }

            if self.redis.pool_size == 0 {
                return Err(ConfigError::validation(
                    "lock.redis.pool_size",
                    "Redis pool size must be greater than 0.",
                ));
            }

            if self.redis.key_prefix.is_empty() {
                return Err(ConfigError::validation(
                    "lock.redis.key_prefix",
                    "Redis key prefix cannot be empty.",
                ));
            }
        }

        Ok(())
    }
}

impl ReportServiceConfig {
    /// Validate report service configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::validation(
                "report_service.base_url",
                "Report service URL must start with http:// or https://",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "report_service.timeout_seconds",
                "Report service timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Validate the complete settings
    ///
    /// Sections are validated in declaration order and the first failure is
    /// returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logger.validate()?;
        self.jobs.validate()?;
        self.lock.validate()?;
        self.report_service.validate()?;
        Ok(())
    }

    /// Accepted combinations that are likely mistakes, reported at startup
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.lock.lease_seconds <= self.jobs.execution_timeout_secs {
            warnings.push(format!(
                "lock.lease_seconds ({}) does not exceed jobs.execution_timeout_secs ({}); \
                 a lease can expire while its job is still executing",
                self.lock.lease_seconds, self.jobs.execution_timeout_secs
            ));
        }

        let environment = self.application.environment;
        if self.lock.backend == LockBackend::Memory
            && !matches!(environment, Environment::Development | Environment::Test)
        {
            warnings.push(format!(
                "lock.backend is memory in {environment}; \
                 instances sharing the database will not exclude each other"
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.database.url = "postgres://localhost/scheduler".to_string();
        settings
    }

    fn field_of(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_settings_with_database_url_are_valid() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_database_url_required() {
        let settings = Settings::default();
        assert_eq!(field_of(settings.validate()), "database.url");
    }

    #[test]
    fn test_database_rejects_non_postgres_url() {
        let mut settings = valid_settings();
        settings.database.url = "mysql://localhost/db".to_string();
        assert_eq!(field_of(settings.validate()), "database.url");
    }

    #[test]
    fn test_database_min_exceeds_max() {
        let mut settings = valid_settings();
        settings.database.min_connections = 20;
        assert_eq!(field_of(settings.validate()), "database.min_connections");
    }

    #[test]
    fn test_logger_invalid_level() {
        let mut settings = valid_settings();
        settings.logger.level = "loud".to_string();
        assert_eq!(field_of(settings.validate()), "logger.level");
    }

    #[test]
    fn test_logger_requires_an_output() {
        let mut settings = valid_settings();
        settings.logger.console.enabled = false;
        assert_eq!(field_of(settings.validate()), "logger");
    }

    #[test]
    fn test_jobs_invalid_dispatch_schedule() {
        let mut settings = valid_settings();
        settings.jobs.dispatch_schedule = "every fifteen minutes".to_string();
        assert_eq!(field_of(settings.validate()), "jobs.dispatch_schedule");
    }

    #[test]
    fn test_jobs_zero_attempts_rejected() {
        let mut settings = valid_settings();
        settings.jobs.max_attempts = 0;
        assert_eq!(field_of(settings.validate()), "jobs.max_attempts");
    }

    #[test]
    fn test_jobs_zero_timeout_rejected() {
        let mut settings = valid_settings();
        settings.jobs.execution_timeout_secs = 0;
        assert_eq!(field_of(settings.validate()), "jobs.execution_timeout_secs");
    }

    #[test]
    fn test_lock_zero_lease_rejected() {
        let mut settings = valid_settings();
        settings.lock.lease_seconds = 0;
        assert_eq!(field_of(settings.validate()), "lock.lease_seconds");
    }

    #[test]
    fn test_redis_url_checked_only_for_redis_backend() {
        let mut settings = valid_settings();
        settings.lock.redis.url = "localhost:6379".to_string();
        assert!(settings.validate().is_ok());

        settings.lock.backend = LockBackend::Redis;
        assert_eq!(field_of(settings.validate()), "lock.redis.url");
    }

    #[test]
    fn test_lease_not_exceeding_timeout_warns() {
        let mut settings = valid_settings();
        settings.lock.lease_seconds = 300;
        settings.jobs.execution_timeout_secs = 300;
        let warnings = settings.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("lock.lease_seconds (300)"));

        settings.lock.lease_seconds = 1200;
        assert!(settings.warnings().is_empty());
    }

    #[test]
    fn test_memory_lock_backend_warns_outside_development() {
        let mut settings = valid_settings();
        settings.lock.lease_seconds = 1200;
        for environment in [Environment::Development, Environment::Test] {
            settings.application.environment = environment;
            assert!(settings.warnings().is_empty());
        }

        settings.application.environment = Environment::Production;
        let warnings = settings.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("memory in production"));

        settings.lock.backend = LockBackend::Redis;
        assert!(settings.warnings().is_empty());
    }

    #[test]
    fn test_report_service_url_scheme() {
        let mut settings = valid_settings();
        settings.report_service.base_url = "ftp://reports".to_string();
        assert_eq!(field_of(settings.validate()), "report_service.base_url");
    }

    proptest! {
        #[test]
        fn property_jobs_config_in_range_is_valid(
            timeout in 1u64..=3600,
            attempts in 1u32..=10,
            base_delay in 0u64..=60_000,
            fallback in 1u64..=172_800,
            stale in 1u64..=86_400,
        ) {
            let config = JobsConfig {
                execution_timeout_secs: timeout,
                max_attempts: attempts,
                retry_base_delay_ms: base_delay,
                invalid_schedule_fallback_secs: fallback,
                stale_running_after_secs: stale,
                ..Default::default()
            };
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn property_lock_lease_positive_is_valid(lease in 1u64..=86_400, strict in any::<bool>()) {
            let config = LockConfig {
                lease_seconds: lease,
                strict,
                ..Default::default()
            };
            prop_assert!(config.validate().is_ok());
        }
    }
}
