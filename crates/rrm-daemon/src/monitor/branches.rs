//! Branch filter resolution: configured branches plus local git discovery

use super::error::{MonitorError, PollError};
use super::types::BranchFilter;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Default exclusion for discovered branches
pub const DEFAULT_EXCLUDE_BRANCHES: &[&str] = &["*master*"];

/// Compile exclusion globs into a matcher
///
/// # Errors
///
/// Returns `MonitorError::Config` for an invalid pattern.
pub fn compile_excludes(patterns: &[String]) -> Result<GlobSet, MonitorError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| {
            MonitorError::config(format!("Invalid glob pattern '{pattern}': {e}"))
        })?);
    }
    builder
        .build()
        .map_err(|e| MonitorError::config(format!("Failed to build glob set: {e}")))
}

/// Local branches of a git checkout
#[derive(Debug, Clone)]
pub struct LocalBranches {
    repo_path: PathBuf,
    exclude: GlobSet,
}

impl LocalBranches {
    pub fn new(repo_path: impl Into<PathBuf>, exclude: GlobSet) -> Self {
        Self {
            repo_path: repo_path.into(),
            exclude,
        }
    }

    /// List local branch names, minus excluded ones
    pub async fn discover(&self) -> Result<Vec<String>, MonitorError> {
        let repo_path = self.repo_path.clone();
        let output = tokio::task::spawn_blocking(move || {
            Command::new("git")
                .arg("-C")
                .arg(&repo_path)
                .args(["for-each-ref", "--format=%(refname:short)", "refs/heads"])
                .output()
        })
        .await
        .map_err(|e| MonitorError::Runtime {
            message: format!("Task join error: {e}"),
            source: Some(Box::new(e)),
        })?
        .map_err(|e| MonitorError::Runtime {
            message: format!("Failed to execute git: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MonitorError::Runtime {
                message: format!(
                    "git for-each-ref failed in {}: {}",
                    self.repo_path.display(),
                    stderr.trim()
                ),
                source: None,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(self.filter_refs(&stdout))
    }

    fn filter_refs(&self, refs: &str) -> Vec<String> {
        refs.lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| {
                let excluded = self.exclude.is_match(name);
                if excluded {
                    debug!("Skipping excluded branch {name}");
                }
                !excluded
            })
            .map(str::to_string)
            .collect()
    }
}

/// Where the branches of interest come from.
///
/// Resolved every cycle so newly created local branches are picked up.
#[derive(Debug, Clone, Default)]
pub struct BranchSource {
    configured: Vec<String>,
    discovery: Option<LocalBranches>,
}

impl BranchSource {
    pub fn new(configured: Vec<String>, discovery: Option<LocalBranches>) -> Self {
        Self {
            configured,
            discovery,
        }
    }

    /// Fixed branch list, no discovery
    pub fn fixed<S: Into<String>>(branches: impl IntoIterator<Item = S>) -> Self {
        Self::new(branches.into_iter().map(Into::into).collect(), None)
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_some()
    }

    /// Configured branches first, then discovered ones
    ///
    /// # Errors
    ///
    /// Discovery failures surface as a `branch discovery` [`PollError`].
    pub async fn resolve(&self) -> Result<BranchFilter, PollError> {
        let mut filter: BranchFilter = self.configured.iter().cloned().collect();

        if let Some(discovery) = &self.discovery {
            let discovered = discovery.discover().await.map_err(|source| PollError {
                operation: PollError::BRANCH_DISCOVERY,
                branch: None,
                source,
            })?;
            for branch in discovered {
                filter.insert(branch);
            }
        }

        Ok(filter)
    }
}
