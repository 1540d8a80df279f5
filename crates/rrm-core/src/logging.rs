//! Shared logging initialization for rrm binaries.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(raw: &str) -> tracing::Level {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Level requested through `RRM_LOG` (defaults to info).
pub fn level_from_env() -> tracing::Level {
    parse_level(&std::env::var("RRM_LOG").unwrap_or_else(|_| "info".to_string()))
}

/// Initialize process-level tracing output from `RRM_LOG`.
///
/// Safe to call multiple times; only the first call installs the subscriber.
pub fn init() {
    init_with_level(level_from_env());
}

/// Initialize tracing with an explicit maximum level (e.g. from `--verbose`).
pub fn init_with_level(level: tracing::Level) {
    if INIT.get().is_some() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
    let _ = INIT.set(());
}
