//! Provider trait for querying a remote CI service

use super::error::MonitorError;
use super::types::Build;
use std::future::Future;
use std::pin::Pin;

/// Async trait for provider-agnostic build queries.
///
/// Each CI service (TeamCity, GitHub Actions, ...) implements this trait.
/// Uses RPITIT (Return Position Impl Trait in Traits) with explicit Send bounds.
pub trait CiProvider: Send + Sync + std::fmt::Debug {
    /// Most recent build for a branch, or `None` if the branch has none
    fn latest_build(
        &self,
        branch: &str,
    ) -> impl Future<Output = Result<Option<Build>, MonitorError>> + Send;

    /// Provider name for logging/display
    fn provider_name(&self) -> &str;
}

/// Object-safe version of CiProvider for type erasure.
///
/// Implemented automatically for every `CiProvider`, so the registry and the
/// poller can hold a `Box<dyn ErasedCiProvider>`.
pub trait ErasedCiProvider: Send + Sync + std::fmt::Debug {
    fn latest_build<'a>(
        &'a self,
        branch: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Build>, MonitorError>> + Send + 'a>>;

    fn provider_name(&self) -> &str;
}

impl<T: CiProvider> ErasedCiProvider for T {
    fn latest_build<'a>(
        &'a self,
        branch: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Build>, MonitorError>> + Send + 'a>> {
        Box::pin(CiProvider::latest_build(self, branch))
    }

    fn provider_name(&self) -> &str {
        CiProvider::provider_name(self)
    }
}
