//! Canonical home directory resolution for rrm
//!
//! # Precedence
//!
//! 1. `RRM_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default
//!
//! Integration tests should point `RRM_HOME` at a temp dir rather than touch
//! the real home directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the home directory for rrm operations
///
/// # Errors
///
/// Returns an error if `RRM_HOME` is not set and the platform home directory
/// cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("RRM_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Directory holding the global config and default event log
pub fn config_dir(home: &std::path::Path) -> PathBuf {
    home.join(".config/rrm")
}
