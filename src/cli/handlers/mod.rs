//! Command handlers for CLI operations
//!
//! This module contains handlers for different CLI commands,
//! separating command execution logic from parsing and validation.

pub mod check_schedule;
pub mod migrate;
pub mod run_once;
pub mod serve;

pub use check_schedule::CheckScheduleCommandHandler;
pub use migrate::MigrateCommandHandler;
pub use run_once::RunOnceCommandHandler;
pub use serve::ServeCommandHandler;
