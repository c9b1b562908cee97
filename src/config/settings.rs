//! Configuration settings structures for compliance-scheduler
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::environment::Environment;
use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig, RotationConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "compliance-scheduler".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/scheduler.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_files() -> usize {
    5
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Application version
    #[serde(default = "default_app_version")]
    pub version: String,

    /// Environment the settings were loaded for; set by the loader
    #[serde(skip)]
    pub environment: Environment,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
            environment: Environment::default(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// Diesel database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Whether to automatically run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    /// Whether console output is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether to use colored output
    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// Rotation settings for file logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSettings {
    /// Maximum file size in bytes before rotation
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Maximum number of rotated files to keep
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_files: default_max_files(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Whether file output is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Path to the log file
    #[serde(default = "default_log_path")]
    pub path: String,

    /// Whether to append to existing file
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Rotation settings
    #[serde(default)]
    pub rotation: RotationSettings,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
            rotation: RotationSettings::default(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console output settings
    #[serde(default)]
    pub console: ConsoleSettings,

    /// File output settings
    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime `LoggerConfig`
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

impl FileSettings {
    /// Convert FileSettings to FileConfig
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: e.to_string(),
            })?;

        let rotation = RotationConfig::new(self.rotation.max_size, self.rotation.max_files)
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.rotation".to_string(),
                message: e.to_string(),
            })?;

        FileConfig::new(
            self.enabled,
            PathBuf::from(self.path),
            self.append,
            format,
            rotation,
        )
        .map_err(|e| ConfigError::ValidationError {
            field: "logger.file".to_string(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Jobs Configuration
// ============================================================================

fn default_dispatch_schedule() -> String {
    "0 */15 * * * *".to_string()
}

fn default_execution_timeout() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_invalid_schedule_fallback() -> u64 {
    24 * 60 * 60
}

fn default_stale_running_after() -> u64 {
    60 * 60
}

/// Dispatcher and execution policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Whether the `serve` command runs dispatch passes
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression for the periodic dispatch trigger
    #[serde(default = "default_dispatch_schedule")]
    pub dispatch_schedule: String,

    /// Hard wall-clock limit for a single handler attempt, in seconds
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,

    /// Total attempts per due cycle (the first attempt included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each further attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// How far in the future a malformed schedule is pushed, in seconds
    #[serde(default = "default_invalid_schedule_fallback")]
    pub invalid_schedule_fallback_secs: u64,

    /// RUNNING jobs due longer ago than this are reset to ACTIVE, in seconds
    #[serde(default = "default_stale_running_after")]
    pub stale_running_after_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dispatch_schedule: default_dispatch_schedule(),
            execution_timeout_secs: default_execution_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            invalid_schedule_fallback_secs: default_invalid_schedule_fallback(),
            stale_running_after_secs: default_stale_running_after(),
        }
    }
}

// ============================================================================
// Lock Configuration
// ============================================================================

fn default_lease_seconds() -> u64 {
    300
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    4
}

fn default_redis_connection_timeout() -> u64 {
    5
}

fn default_redis_key_prefix() -> String {
    "compliance-scheduler".to_string()
}

/// Shared lock store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// In-process tokens; only correct for a single instance
    #[default]
    Memory,
    Redis,
}

/// Redis lock store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisLockConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,

    /// Key prefix for all lock tokens
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisLockConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

/// Cross-instance mutual exclusion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock store backend
    #[serde(default)]
    pub backend: LockBackend,

    /// Lease of a lock token in seconds
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,

    /// Deny the lock when the store is unreachable instead of granting it
    #[serde(default)]
    pub strict: bool,

    /// Redis settings, used when `backend = "redis"`
    #[serde(default)]
    pub redis: RedisLockConfig,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackend::default(),
            lease_seconds: default_lease_seconds(),
            strict: false,
            redis: RedisLockConfig::default(),
        }
    }
}

// ============================================================================
// Report Service Configuration
// ============================================================================

fn default_report_service_url() -> String {
    "http://127.0.0.1:8080/internal/reports".to_string()
}

fn default_report_service_timeout() -> u64 {
    240
}

/// External report service that performs the actual report generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportServiceConfig {
    /// Base URL; the job type is appended as the last path segment
    #[serde(default = "default_report_service_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_report_service_timeout")]
    pub timeout_seconds: u64,

    /// Optional bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for ReportServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_report_service_url(),
            timeout_seconds: default_report_service_timeout(),
            api_token: None,
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
///
/// This structure represents the entire configuration that can be loaded
/// from TOML files and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Application information
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logger configuration
    #[serde(default)]
    pub logger: LoggerSettings,

    /// Dispatcher configuration
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Lock store configuration
    #[serde(default)]
    pub lock: LockConfig,

    /// Report service configuration
    #[serde(default)]
    pub report_service: ReportServiceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lock_config_is_fail_open_memory() {
        let config = LockConfig::default();
        assert_eq!(config.backend, LockBackend::Memory);
        assert_eq!(config.lease_seconds, 300);
        assert!(!config.strict);
    }

    #[test]
    fn test_default_jobs_config_matches_engine_policy() {
        let config = JobsConfig::default();
        assert_eq!(config.execution_timeout_secs, 300);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_base_delay_ms, 1000);
        assert_eq!(config.invalid_schedule_fallback_secs, 86_400);
    }

    #[test]
    fn test_logger_settings_into_logger_config() {
        let settings = LoggerSettings {
            level: "debug".to_string(),
            file: FileSettings {
                enabled: true,
                format: "compact".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = settings.into_logger_config().unwrap();
        assert_eq!(config.level, "debug");
        assert!(config.file.enabled);
        assert_eq!(config.file.format, LogFormat::Compact);
    }

    #[test]
    fn test_logger_settings_rejects_unknown_format() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "xml".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        match settings.into_logger_config() {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "logger.file.format")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
