//! Configuration loader for compliance-scheduler
//!
//! This module provides the `ConfigLoader` struct that handles loading
//! configuration from multiple sources with proper precedence.

use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for configuration directory
const CONFIG_DIR_ENV: &str = "SCHEDULER_CONFIG_DIR";

/// Environment variable for specific configuration file
const CONFIG_FILE_ENV: &str = "SCHEDULER_CONFIG_FILE";

/// Default configuration directory
const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "SCHEDULER";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Configuration loader that handles layered configuration loading
///
/// The loader supports the following configuration sources (in order of priority):
/// 1. `default.toml` - Base default configuration (required)
/// 2. `{environment}.toml` - Environment-specific configuration (optional)
/// 3. `local.toml` - Local development overrides (optional)
/// 4. `SCHEDULER_*` environment variables (highest priority)
#[derive(Debug)]
pub struct ConfigLoader {
    /// Configuration directory path
    config_dir: PathBuf,
    /// Specific configuration file path (if set, skips layered loading)
    config_file: Option<PathBuf>,
    /// Current application environment
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a new configuration loader
    ///
    /// This reads environment variables to determine:
    /// - Configuration directory (`SCHEDULER_CONFIG_DIR`)
    /// - Specific configuration file (`SCHEDULER_CONFIG_FILE`)
    /// - Application environment (`SCHEDULER_APP_ENV`)
    ///
    /// # Errors
    ///
    /// Returns an error if both `SCHEDULER_CONFIG_DIR` and `SCHEDULER_CONFIG_FILE` are set,
    /// as they are mutually exclusive.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        // Check mutual exclusivity
        if config_file.is_some() && std::env::var(CONFIG_DIR_ENV).is_ok() {
            return Err(ConfigError::mutual_exclusivity(
                "SCHEDULER_CONFIG_DIR and SCHEDULER_CONFIG_FILE cannot both be set. \
                 Use SCHEDULER_CONFIG_DIR for layered configuration or \
                 SCHEDULER_CONFIG_FILE for a single configuration file.",
            ));
        }

        let environment = AppEnvironment::from_env();

        Ok(Self {
            config_dir,
            config_file,
            environment,
        })
    }

    /// Loader bound to a single configuration file
    ///
    /// Layered loading is skipped; `SCHEDULER_*` overrides still apply.
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.into()),
            environment: AppEnvironment::from_env(),
        }
    }

    /// Replace the environment used to pick `{environment}.toml`
    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /// Load, deserialize and validate the settings
    ///
    /// # Errors
    ///
    /// - `FileNotFound` when a required layer is missing
    /// - `ParseError` when the merged sources do not fit `Settings`
    /// - `ValidationError` from `Settings::validate`
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in self.file_layers() {
            if required && !path.exists() {
                return Err(ConfigError::file_not_found(format!(
                    "Required configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Toml).required(required),
            );
        }

        // SCHEDULER_JOBS__MAX_ATTEMPTS -> jobs.max_attempts
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;
        settings.application.environment = self.environment;
        settings.validate()?;

        Ok(settings)
    }

    /// File sources in increasing priority, each with its required flag
    fn file_layers(&self) -> Vec<(PathBuf, bool)> {
        match &self.config_file {
            Some(file) => vec![(file.clone(), true)],
            None => vec![
                (self.config_dir.join("default.toml"), true),
                (
                    self.config_dir
                        .join(format!("{}.toml", self.environment.as_str())),
                    false,
                ),
                (self.config_dir.join("local.toml"), false),
            ],
        }
    }
}
