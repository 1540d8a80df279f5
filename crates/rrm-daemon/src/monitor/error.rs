//! Error types for the remote-run monitor

/// Monitor errors with structured variants
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor init failed: {message}")]
    Init {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("monitor runtime error: {message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("monitor config error: {message}")]
    Config { message: String },

    #[error("provider error: {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("authentication failed: {message}")]
    Auth { message: String },
}

impl MonitorError {
    pub(crate) fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Failure of a single poll cycle.
///
/// Carries the name of the operation that failed so the resulting
/// notification can say what went wrong.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed{}: {source}", branch_suffix(.branch))]
pub struct PollError {
    pub operation: &'static str,
    pub branch: Option<String>,
    #[source]
    pub source: MonitorError,
}

fn branch_suffix(branch: &Option<String>) -> String {
    branch
        .as_deref()
        .map(|b| format!(" for branch {b}"))
        .unwrap_or_default()
}

impl PollError {
    /// Operation name for a failed remote build query
    pub const REMOTE_RUN_POLL: &'static str = "remote run poll";
    /// Operation name for a failed branch discovery
    pub const BRANCH_DISCOVERY: &'static str = "branch discovery";
}

impl From<PollError> for MonitorError {
    fn from(err: PollError) -> Self {
        MonitorError::Runtime {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
