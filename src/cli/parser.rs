//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Distributed scheduled-job execution engine for compliance reporting
#[derive(Parser, Debug)]
#[command(name = "compliance-scheduler")]
#[command(about = "Distributed scheduled-job execution engine for compliance reporting")]
#[command(long_about = "
compliance-scheduler periodically dispatches due compliance-reporting jobs.
Each job is claimed through a shared lock, executed under a hard timeout with
bounded retries, and rescheduled from its cron expression.

EXAMPLES:
    # Run the periodic dispatcher with default configuration
    compliance-scheduler serve

    # Use a custom configuration file
    compliance-scheduler --config /path/to/config.toml serve

    # Check configuration without starting the dispatcher
    compliance-scheduler serve --dry-run

    # Execute a single dispatch pass and exit
    compliance-scheduler run-once

    # Preview the next firings of a schedule
    compliance-scheduler check-schedule \"0 2 * * 1\" --count 3

    # Run database migrations
    compliance-scheduler migrate

    # Rollback last 2 migrations
    compliance-scheduler migrate --rollback 2
")]
#[command(version = crate::build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load a single TOML file instead of the layered `config/` directory.
    /// Environment variable overrides still apply. The file must exist.
    ///
    /// Example: --config /etc/compliance-scheduler/production.toml
    #[arg(
        short,
        long,
        value_name = "FILE",
        value_parser = super::validation::validate_config_file_path
    )]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` overlay is loaded.
    ///
    /// Available values: development (dev), test, staging (stage), production (prod)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Raises the log level to debug. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Lowers the log level to error. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the periodic dispatcher (default)
    ///
    /// Connects to the database and lock store, resets stale RUNNING jobs,
    /// then runs a dispatch pass on every tick of `jobs.dispatch_schedule`
    /// until Ctrl+C or SIGTERM.
    ///
    /// Examples:
    ///   compliance-scheduler serve             # Start with defaults
    ///   compliance-scheduler serve --dry-run   # Validate config without starting
    Serve {
        /// Log level override
        ///
        /// Overrides both configuration file settings and global --verbose/--quiet flags.
        ///
        /// Available levels: error, warn, info, debug, trace
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        ///
        /// Returns exit code 0 if valid, non-zero if invalid.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a single dispatch pass and exit
    ///
    /// Useful for ad-hoc runs and for driving the engine from an external
    /// scheduler. Prints a JSON summary of the pass.
    RunOnce,
    /// Database migration operations
    ///
    /// Examples:
    ///   compliance-scheduler migrate                    # Apply all pending migrations
    ///   compliance-scheduler migrate --dry-run          # Show pending migrations without applying
    ///   compliance-scheduler migrate --rollback 3       # Rollback the last 3 migrations
    Migrate {
        /// Show pending migrations without applying
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to rollback
        ///
        /// Must be between 1 and 100. Cannot be used with --dry-run.
        #[arg(
            long,
            value_name = "STEPS",
            conflicts_with = "dry_run",
            value_parser = super::validation::validate_rollback_steps
        )]
        rollback: Option<u32>,
    },
    /// Validate a cron expression and print its next firings
    ///
    /// Accepts 5-field (minute-first) and 6-field (seconds-first) expressions.
    CheckSchedule {
        /// Cron expression to check
        expression: String,

        /// Number of upcoming firings to print
        #[arg(
            short = 'n',
            long,
            default_value_t = 5,
            value_parser = super::validation::validate_preview_count
        )]
        count: usize,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Migrate { dry_run, rollback }) = &self.command
            && *dry_run
            && rollback.is_some()
        {
            return Err("Cannot use --dry-run and --rollback together".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }

    /// Get detailed help for validation errors
    pub fn get_validation_help() -> &'static str {
        r#"
Common validation errors and solutions:

Configuration file validation:
  - File must exist and be readable
  - File must be in TOML format
  - Example: --config /path/to/config.toml

Migration rollback validation:
  - Steps must be between 1 and 100
  - Cannot be used with --dry-run
  - Example: --rollback 3

Schedule preview:
  - Count must be between 1 and 100
  - Example: check-schedule "*/15 * * * *" --count 10

For more help, use: compliance-scheduler help <subcommand>
"#
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["compliance-scheduler", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["compliance-scheduler", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_default_behavior() {
        let cli = Cli::try_parse_from(["compliance-scheduler"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.env.is_none());
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from([
            "compliance-scheduler",
            "serve",
            "--log-level",
            "debug",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Serve { log_level, dry_run }) => {
                assert_eq!(log_level, Some(LogLevel::Debug));
                assert!(dry_run);
            }
            other => panic!("Expected Serve command, got {other:?}"),
        }
    }

    #[test]
    fn test_run_once_command() {
        let cli = Cli::try_parse_from(["compliance-scheduler", "run-once"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::RunOnce)));
    }

    #[test]
    fn test_migrate_command() {
        let cli = Cli::try_parse_from(["compliance-scheduler", "migrate", "--dry-run"]).unwrap();
        if let Some(Commands::Migrate { dry_run, rollback }) = cli.command {
            assert!(dry_run);
            assert!(rollback.is_none());
        } else {
            panic!("Expected Migrate command");
        }
    }

    #[test]
    fn test_migrate_rollback_out_of_range() {
        let result = Cli::try_parse_from(["compliance-scheduler", "migrate", "--rollback", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_schedule_defaults_to_five() {
        let cli =
            Cli::try_parse_from(["compliance-scheduler", "check-schedule", "0 2 * * *"]).unwrap();
        match cli.command {
            Some(Commands::CheckSchedule { expression, count }) => {
                assert_eq!(expression, "0 2 * * *");
                assert_eq!(count, 5);
            }
            other => panic!("Expected CheckSchedule command, got {other:?}"),
        }
    }

    #[test]
    fn test_check_schedule_count() {
        let cli = Cli::try_parse_from([
            "compliance-scheduler",
            "check-schedule",
            "0 2 * * *",
            "-n",
            "12",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::CheckSchedule { count: 12, .. })
        ));
    }

    #[test]
    fn test_staging_environment_alias() {
        let cli = Cli::try_parse_from(["compliance-scheduler", "--env", "stage"]).unwrap();
        assert_eq!(cli.env, Some(Environment::Staging));
        assert_eq!(
            crate::config::Environment::from(Environment::Staging),
            crate::config::Environment::Staging
        );
    }

    #[test]
    fn test_verbose_flag() {
        let cli = Cli::try_parse_from(["compliance-scheduler", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err =
            Cli::try_parse_from(["compliance-scheduler", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
