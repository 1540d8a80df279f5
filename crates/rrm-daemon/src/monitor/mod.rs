//! Remote-run monitor
//!
//! Polls a CI service for the latest build of each branch of interest,
//! classifies each build and delivers the resulting notifications.

pub mod branches;
pub mod classify;
pub mod config;
pub mod error;
pub mod github;
pub mod message_log;
#[cfg(any(test, feature = "test-support"))]
pub mod mock_provider;
pub mod notifier;
pub mod poller;
pub mod provider;
pub mod registry;
pub mod service;
pub mod teamcity;
pub mod types;

pub use branches::{BranchSource, LocalBranches};
pub use classify::{classify, cycle_events, error_event, found_event};
pub use config::MonitorConfig;
pub use error::{MonitorError, PollError};
pub use github::GitHubActionsProvider;
pub use message_log::{LogEntry, MessageLog};
pub use notifier::{EventLogSink, NotificationSink, Notifier, SinkError, TracingSink};
pub use poller::BuildPoller;
pub use provider::{CiProvider, ErasedCiProvider};
pub use registry::{CiProviderFactory, CiProviderRegistry};
pub use service::RemoteRunMonitor;
pub use teamcity::TeamCityProvider;
pub use types::{
    BranchFilter, Build, BuildRef, BuildState, BuildStatus, EventKind, NotificationAction,
    NotificationEvent, PolledBuild, Severity,
};
