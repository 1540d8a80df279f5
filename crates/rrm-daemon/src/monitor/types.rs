//! Shared types for the remote-run monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a CI build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BuildState {
    Running,
    Finished,
    Deleted,
    Queued,
    /// Anything the CI service reports that we don't recognize
    Unknown,
}

impl BuildState {
    /// Parse a provider state string. Never fails.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "finished" => Self::Finished,
            "deleted" => Self::Deleted,
            "queued" => Self::Queued,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Deleted => "deleted",
            Self::Queued => "queued",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for BuildState {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a CI build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BuildStatus {
    Success,
    Failure,
    Error,
    Unknown,
}

impl BuildStatus {
    /// Parse a provider status string. Never fails.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Failure or Error
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a CI build as seen during one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Provider-specific ID (opaque)
    pub id: String,
    /// Branch the build ran for
    pub branch: String,
    pub state: BuildState,
    pub status: BuildStatus,
    /// Human-readable status line from the CI service
    pub status_text: String,
    /// Web URL of the build
    pub home_url: String,
}

/// A build paired with the branch it was requested for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledBuild {
    pub build: Build,
    pub branch: String,
}

/// Ordered, de-duplicated set of branch names to poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchFilter {
    branches: Vec<String>,
}

impl BranchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch; blank names and duplicates are ignored.
    ///
    /// Returns `true` if the branch was added.
    pub fn insert(&mut self, branch: impl Into<String>) -> bool {
        let branch = branch.into();
        let branch = branch.trim();
        if branch.is_empty() || self.contains(branch) {
            return false;
        }
        self.branches.push(branch.to_string());
        true
    }

    pub fn contains(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for BranchFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut filter = Self::new();
        for branch in iter {
            filter.insert(branch);
        }
        filter
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A build was observed this cycle
    BuildFound,
    BuildRunning,
    /// Build status is Failure or Error
    BuildFailed,
    BuildGeneric,
    /// The poll cycle itself failed
    PollFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildFound => "build_found",
            Self::BuildRunning => "build_running",
            Self::BuildFailed => "build_failed",
            Self::BuildGeneric => "build_generic",
            Self::PollFailed => "poll_failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the build a notification refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    pub id: String,
    pub branch: String,
    /// State bucket the build was classified into
    pub state: BuildState,
}

/// Optional user action attached to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    pub url: String,
}

/// A rendered, deliverable notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NotificationAction>,
    pub timestamp: DateTime<Utc>,
}
