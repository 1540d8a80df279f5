//! Build-status poller

use super::error::PollError;
use super::provider::ErasedCiProvider;
use super::types::{BranchFilter, PolledBuild};
use tracing::debug;

/// Queries the latest build for each branch of interest
#[derive(Debug)]
pub struct BuildPoller {
    provider: Box<dyn ErasedCiProvider>,
}

impl BuildPoller {
    pub fn new(provider: Box<dyn ErasedCiProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Poll every branch once, in filter order.
    ///
    /// Branches without a build are skipped. The first failing query aborts
    /// the cycle and discards anything already gathered.
    ///
    /// # Errors
    ///
    /// Returns a [`PollError`] naming the failing branch.
    pub async fn poll_once(&self, branches: &BranchFilter) -> Result<Vec<PolledBuild>, PollError> {
        let mut results = Vec::with_capacity(branches.len());

        for branch in branches.iter() {
            let latest = self
                .provider
                .latest_build(branch)
                .await
                .map_err(|source| PollError {
                    operation: PollError::REMOTE_RUN_POLL,
                    branch: Some(branch.to_string()),
                    source,
                })?;

            match latest {
                Some(build) => {
                    debug!(
                        "{}: branch {} -> build {} ({})",
                        self.provider_name(),
                        branch,
                        build.id,
                        build.state
                    );
                    results.push(PolledBuild {
                        build,
                        branch: branch.to_string(),
                    });
                }
                None => debug!("{}: no build for branch {}", self.provider_name(), branch),
            }
        }

        Ok(results)
    }
}
