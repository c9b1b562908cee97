//! CLI argument validation functions
//!
//! Value parsers for arguments whose constraints clap cannot express directly.

use std::fs;
use std::path::PathBuf;

/// Upper bound on `check-schedule --count`
const MAX_PREVIEW_COUNT: usize = 100;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!(
            "Cannot read configuration file '{}': {}",
            path_str, e
        )),
    }
}

/// Validate rollback steps is a positive number
pub fn validate_rollback_steps(steps_str: &str) -> Result<u32, String> {
    let steps: u32 = steps_str.parse().map_err(|_| {
        format!(
            "Rollback steps must be a valid positive number, got: '{}'",
            steps_str
        )
    })?;

    if steps == 0 {
        return Err("Rollback steps must be greater than 0".to_string());
    }

    if steps > 100 {
        return Err("Rollback steps cannot exceed 100 for safety reasons".to_string());
    }

    Ok(steps)
}

/// Validate the number of firings `check-schedule` should print
pub fn validate_preview_count(count_str: &str) -> Result<usize, String> {
    let count: usize = count_str
        .parse()
        .map_err(|_| format!("Count must be a valid positive number, got: '{}'", count_str))?;

    if count == 0 || count > MAX_PREVIEW_COUNT {
        return Err(format!(
            "Count must be between 1 and {}, got: {}",
            MAX_PREVIEW_COUNT, count
        ));
    }

    Ok(count)
}
