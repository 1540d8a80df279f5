//! Typed configuration for the remote-run monitor, parsed from [monitor]

use super::branches::{BranchSource, DEFAULT_EXCLUDE_BRANCHES, LocalBranches, compile_excludes};
use super::error::MonitorError;
use super::message_log::DEFAULT_LOG_CAPACITY;
use crate::scheduler::{CronSchedule, DEFAULT_SCHEDULE, OverlapPolicy};
use globset::GlobSet;
use std::path::{Path, PathBuf};

/// Provider used when none is configured
pub const DEFAULT_PROVIDER: &str = "teamcity";

/// Validated monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub schedule: CronSchedule,
    pub overlap: OverlapPolicy,
    /// Registered provider name (e.g., "teamcity", "github")
    pub provider: String,
    /// Branches always polled, in order
    pub branches: Vec<String>,
    /// Also poll the local branches of `repo_path`
    pub discover_local_branches: bool,
    pub repo_path: PathBuf,
    /// Globs removing discovered branches
    pub exclude_branches: Vec<String>,
    /// Compiled `exclude_branches`
    pub exclude_matcher: GlobSet,
    /// Message log capacity
    pub log_capacity: usize,
}

impl MonitorConfig {
    /// Parse configuration from the `[monitor]` table.
    ///
    /// Config discovery anchors a file-provided `repo_path` to that file;
    /// a path still relative here is resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Config` if:
    /// - the schedule or overlap policy does not parse
    /// - an exclude glob is invalid
    /// - `log_capacity` is below 1
    /// - no branches are configured and discovery is off
    pub fn from_toml(table: &toml::Table, base_dir: &Path) -> Result<Self, MonitorError> {
        let schedule_expr = table
            .get("schedule")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_SCHEDULE);
        let schedule = CronSchedule::parse(schedule_expr)
            .map_err(|e| MonitorError::config(format!("[monitor] schedule: {e}")))?;

        let overlap = match table.get("overlap").and_then(|v| v.as_str()) {
            Some(s) => s
                .parse()
                .map_err(|e| MonitorError::config(format!("[monitor] overlap: {e}")))?,
            None => OverlapPolicy::default(),
        };

        let provider = table
            .get("provider")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PROVIDER)
            .to_string();

        let branches = string_list(table, "branches").unwrap_or_default();

        let discover_local_branches = table
            .get("discover_local_branches")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let repo_path = table
            .get("repo_path")
            .and_then(|v| v.as_str())
            .map(|p| base_dir.join(p))
            .unwrap_or_else(|| base_dir.to_path_buf());

        let exclude_branches = string_list(table, "exclude_branches")
            .unwrap_or_else(|| DEFAULT_EXCLUDE_BRANCHES.iter().map(|s| s.to_string()).collect());
        let exclude_matcher = compile_excludes(&exclude_branches)?;

        let log_capacity = match table.get("log_capacity").and_then(|v| v.as_integer()) {
            Some(n) if n < 1 => {
                return Err(MonitorError::config(
                    "[monitor] log_capacity must be at least 1",
                ));
            }
            Some(n) => n as usize,
            None => DEFAULT_LOG_CAPACITY,
        };

        if !discover_local_branches && branches.iter().all(|b| b.trim().is_empty()) {
            return Err(MonitorError::config(
                "no branches to monitor: set [monitor] branches or discover_local_branches = true",
            ));
        }

        Ok(Self {
            schedule,
            overlap,
            provider,
            branches,
            discover_local_branches,
            repo_path,
            exclude_branches,
            exclude_matcher,
            log_capacity,
        })
    }

    /// Branch source described by this config
    pub fn branch_source(&self) -> BranchSource {
        let discovery = self
            .discover_local_branches
            .then(|| LocalBranches::new(self.repo_path.clone(), self.exclude_matcher.clone()));
        BranchSource::new(self.branches.clone(), discovery)
    }
}

fn string_list(table: &toml::Table, key: &str) -> Option<Vec<String>> {
    table.get(key).and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    })
}
