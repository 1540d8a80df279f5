//! Mock CI provider for testing

use super::error::MonitorError;
use super::provider::CiProvider;
use super::types::{Build, BuildState, BuildStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock CI provider for testing. Returns canned builds per branch.
///
/// Clones share state, so a test can keep a handle while the monitor owns
/// the provider.
#[derive(Debug, Clone, Default)]
pub struct MockCiProvider {
    builds: Arc<Mutex<HashMap<String, Build>>>,
    /// If set, every call fails with this message
    error: Arc<Mutex<Option<String>>>,
    /// Number of upcoming calls that fail before succeeding again
    fail_remaining: Arc<AtomicUsize>,
    delay: Option<Duration>,
    /// Track calls for verification
    pub call_log: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of method calls for test assertions
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    LatestBuild(String),
}

impl MockCiProvider {
    /// Create a new mock provider with no builds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider with the given builds, keyed by their branch
    pub fn with_builds(builds: Vec<Build>) -> Self {
        let provider = Self::new();
        for build in builds {
            provider.set_build(build);
        }
        provider
    }

    /// Every call fails with this error until cleared
    pub fn with_error(self, error: impl Into<String>) -> Self {
        self.set_error(Some(error.into()));
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` calls, then behave normally
    pub fn fail_times(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_error(&self, error: Option<String>) {
        *self.error.lock().unwrap() = error;
    }

    /// Replace the build returned for `build.branch`
    pub fn set_build(&self, build: Build) {
        self.builds
            .lock()
            .unwrap()
            .insert(build.branch.clone(), build);
    }

    /// Get a copy of the call log for assertions
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear();
    }

    fn log_call(&self, call: MockCall) {
        self.call_log.lock().unwrap().push(call);
    }

    fn take_scripted_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl CiProvider for MockCiProvider {
    async fn latest_build(&self, branch: &str) -> Result<Option<Build>, MonitorError> {
        self.log_call(MockCall::LatestBuild(branch.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(MonitorError::provider(err));
        }
        if self.take_scripted_failure() {
            return Err(MonitorError::provider(format!(
                "scripted failure for branch {branch}"
            )));
        }

        Ok(self.builds.lock().unwrap().get(branch).cloned())
    }

    fn provider_name(&self) -> &str {
        "MockCiProvider"
    }
}

/// Helper function to create a test build
pub fn create_test_build(id: &str, branch: &str, state: BuildState, status: BuildStatus) -> Build {
    Build {
        id: id.to_string(),
        branch: branch.to_string(),
        state,
        status,
        status_text: state.as_str().to_string(),
        home_url: format!("https://ci.example.com/viewLog.html?buildId={id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_build_for_branch() {
        let provider = MockCiProvider::with_builds(vec![create_test_build(
            "42",
            "feature-x",
            BuildState::Running,
            BuildStatus::Unknown,
        )]);

        let build = provider.latest_build("feature-x").await.unwrap().unwrap();
        assert_eq!(build.id, "42");
        assert!(provider.latest_build("other").await.unwrap().is_none());

        assert_eq!(
            provider.get_calls(),
            vec![
                MockCall::LatestBuild("feature-x".to_string()),
                MockCall::LatestBuild("other".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_provider_with_error() {
        let provider = MockCiProvider::new().with_error("boom");
        let err = provider.latest_build("b").await.unwrap_err();
        assert!(err.to_string().contains("boom"));

        provider.set_error(None);
        assert!(provider.latest_build("b").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_provider_fail_times() {
        let provider = MockCiProvider::new();
        provider.fail_times(2);

        assert!(provider.latest_build("b").await.is_err());
        assert!(provider.latest_build("b").await.is_err());
        assert!(provider.latest_build("b").await.is_ok());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_clones_share_state() {
        let provider = MockCiProvider::new();
        let handle = provider.clone();
        handle.set_build(create_test_build(
            "7",
            "main",
            BuildState::Finished,
            BuildStatus::Success,
        ));

        assert!(provider.latest_build("main").await.unwrap().is_some());
        assert_eq!(handle.call_count(), 1);
        handle.clear_calls();
        assert_eq!(provider.call_count(), 0);
    }
}
