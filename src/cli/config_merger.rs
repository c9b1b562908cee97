//! Configuration merger for CLI arguments and config files
//!
//! This module handles merging CLI argument overrides with file-based configuration,
//! implementing the configuration precedence logic.

use std::path::Path;

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, settings::Settings};

/// Configuration merger that handles CLI argument integration with file-based configuration
///
/// CLI arguments override configuration file and environment values.
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    /// Create a new configuration merger with base configuration
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration for the given CLI arguments
    ///
    /// `--config` selects single-file loading; otherwise the layered loader is
    /// used. `--env` replaces the environment detected from `SCHEDULER_APP_ENV`.
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        Self::load(cli.config.as_deref(), cli.env.map(Environment::from))
    }

    fn load(
        config_path: Option<&Path>,
        environment: Option<Environment>,
    ) -> Result<Self, ConfigError> {
        let loader = match config_path {
            Some(path) => ConfigLoader::for_file(path),
            None => ConfigLoader::new()?,
        };

        let loader = match environment {
            Some(env) => loader.with_environment(env),
            None => loader,
        };

        tracing::debug!(environment = %loader.environment(), "Loading configuration");
        Ok(Self::new(loader.load()?))
    }

    /// Merge CLI arguments with the base configuration
    ///
    /// Command-specific overrides win over global flags. The merged settings
    /// are validated before being returned.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        Self::apply_global_overrides(&mut config, cli);

        if let Some(command) = &cli.command {
            Self::apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands) {
        if let Commands::Serve {
            log_level: Some(level),
            ..
        } = command
        {
            config.logger.level = level.as_str().to_string();
        }
    }

    /// Get the current configuration (useful for inspection)
    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Cli;
    use clap::Parser;
    use std::io::Write;

    fn create_valid_base_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("compliance-scheduler").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_configuration_merger_new() {
        let base_config = Settings::default();
        let merger = ConfigurationMerger::new(base_config.clone());
        assert_eq!(merger.config(), &base_config);
    }

    #[test]
    fn test_merge_verbose_flag() {
        let merger = ConfigurationMerger::new(create_valid_base_config());
        let merged = merger.merge_cli_args(&parse(&["--verbose"])).unwrap();
        assert_eq!(merged.logger.level, "debug");
    }

    #[test]
    fn test_merge_quiet_flag() {
        let merger = ConfigurationMerger::new(create_valid_base_config());
        let merged = merger.merge_cli_args(&parse(&["--quiet"])).unwrap();
        assert_eq!(merged.logger.level, "error");
    }

    #[test]
    fn test_command_log_level_overrides_global() {
        let merger = ConfigurationMerger::new(create_valid_base_config());
        let merged = merger
            .merge_cli_args(&parse(&["--verbose", "serve", "--log-level", "warn"]))
            .unwrap();
        assert_eq!(merged.logger.level, "warn");
    }

    #[test]
    fn test_merge_rejects_invalid_base() {
        let merger = ConfigurationMerger::new(Settings::default());
        let err = merger.merge_cli_args(&parse(&["run-once"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { field, .. } if field == "database.url"
        ));
    }

    #[test]
    fn test_load_from_single_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"postgres://localhost/from_file\"\n\n[jobs]\nmax_attempts = 5"
        )
        .unwrap();

        let merger =
            ConfigurationMerger::load(Some(file.path()), Some(Environment::Production)).unwrap();
        assert_eq!(merger.config().database.url, "postgres://localhost/from_file");
        assert_eq!(merger.config().jobs.max_attempts, 5);
    }
}
