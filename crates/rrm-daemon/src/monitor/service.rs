//! Remote-run monitor: resolves branches, polls, and notifies once per cycle

use super::branches::BranchSource;
use super::classify::{cycle_events, error_event, panic_event};
use super::config::MonitorConfig;
use super::error::{MonitorError, PollError};
use super::message_log::MessageLog;
use super::notifier::Notifier;
use super::poller::BuildPoller;
use super::registry::CiProviderRegistry;
use crate::scheduler::PollJob;
use std::sync::Arc;
use tracing::{debug, info};

/// Ties the poller to the notifier; the scheduler's job
#[derive(Debug)]
pub struct RemoteRunMonitor {
    poller: BuildPoller,
    notifier: Notifier,
    branches: BranchSource,
}

impl RemoteRunMonitor {
    pub fn new(poller: BuildPoller, notifier: Notifier, branches: BranchSource) -> Self {
        Self {
            poller,
            notifier,
            branches,
        }
    }

    /// Build a monitor from validated config, creating the provider through
    /// the registry.
    ///
    /// # Errors
    ///
    /// Returns whatever the provider factory returns, e.g. an unknown provider.
    pub fn from_config(
        config: &MonitorConfig,
        registry: &CiProviderRegistry,
        provider_config: Option<&toml::Table>,
        notifier: Notifier,
    ) -> Result<Self, MonitorError> {
        let provider = registry.create_provider(&config.provider, provider_config)?;
        info!(
            "Remote-run monitor using {} ({} configured branches, discovery: {})",
            provider.provider_name(),
            config.branches.len(),
            config.discover_local_branches
        );
        Ok(Self::new(
            BuildPoller::new(provider),
            notifier,
            config.branch_source(),
        ))
    }

    pub fn message_log(&self) -> &Arc<MessageLog> {
        self.notifier.log()
    }

    /// Run one cycle and deliver its notifications.
    ///
    /// On failure exactly one Error notification is delivered before the
    /// error is returned. Returns the number of builds seen.
    pub async fn poll_once_and_notify(&self) -> Result<usize, PollError> {
        match self.poll_cycle().await {
            Ok(count) => Ok(count),
            Err(e) => {
                self.notifier.notify(error_event(&e));
                Err(e)
            }
        }
    }

    async fn poll_cycle(&self) -> Result<usize, PollError> {
        let branches = self.branches.resolve().await?;
        debug!("Polling {} branches", branches.len());

        let results = self.poller.poll_once(&branches).await?;
        self.notifier.notify_all(cycle_events(&results));
        Ok(results.len())
    }
}

impl PollJob for RemoteRunMonitor {
    fn name(&self) -> &str {
        "remote-run monitor"
    }

    async fn run_cycle(&self) -> Result<(), MonitorError> {
        self.poll_once_and_notify().await?;
        Ok(())
    }

    fn on_panic(&self, message: &str) {
        self.notifier
            .notify(panic_event(PollError::REMOTE_RUN_POLL, message));
    }
}
