//! Main daemon event loop

use crate::daemon::graceful_shutdown;
use crate::monitor::{
    CiProviderRegistry, EventLogSink, MessageLog, MonitorConfig, Notifier, RemoteRunMonitor,
    TracingSink,
};
use crate::scheduler::{Scheduler, SchedulerStats};
use anyhow::{Context, Result};
use remote_run_monitor_core::config::Config;
use remote_run_monitor_core::event_log::{EventLog, EventLogConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long shutdown waits for an in-flight cycle
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire a monitor from resolved configuration.
///
/// Every notification goes to the tracing output and, unless disabled, to
/// the JSONL event log under `home_dir`.
///
/// # Errors
///
/// Fails on an invalid `[monitor]` section or if the provider cannot be
/// created.
pub fn build_monitor(
    config: &Config,
    registry: &CiProviderRegistry,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<(MonitorConfig, Arc<RemoteRunMonitor>)> {
    let monitor_config = MonitorConfig::from_toml(&config.monitor, current_dir)
        .context("Invalid [monitor] configuration")?;

    let log = Arc::new(MessageLog::new(monitor_config.log_capacity));
    let mut notifier = Notifier::new(log).with_sink(Box::new(TracingSink));

    if config.event_log.disabled {
        info!("Event log disabled");
    } else {
        let event_log_config = EventLogConfig::from_settings(&config.event_log, home_dir);
        info!("Event log: {}", event_log_config.path.display());
        let event_log = Arc::new(EventLog::new(event_log_config));
        notifier = notifier.with_sink(Box::new(EventLogSink::new(event_log)));
    }

    let monitor = RemoteRunMonitor::from_config(
        &monitor_config,
        registry,
        config.provider_config(&monitor_config.provider),
        notifier,
    )
    .with_context(|| format!("Failed to create CI provider '{}'", monitor_config.provider))?;

    Ok((monitor_config, Arc::new(monitor)))
}

/// Run the scheduler until `cancel` fires, then shut it down gracefully.
///
/// Returns the scheduler's final counters.
pub async fn run(
    monitor: Arc<RemoteRunMonitor>,
    config: &MonitorConfig,
    cancel: CancellationToken,
) -> Result<SchedulerStats> {
    info!("Initializing daemon event loop");

    let handle = Scheduler::start(config.schedule.clone(), monitor, config.overlap);

    cancel.cancelled().await;
    info!("Shutdown requested");

    let stats = graceful_shutdown(handle, SHUTDOWN_TIMEOUT)
        .await
        .context("Scheduler did not shut down cleanly")?;

    info!(
        "Scheduler stats: {} fired, {} completed, {} failed, {} skipped, {} panicked",
        stats.fired, stats.completed, stats.failed, stats.skipped, stats.panicked
    );
    Ok(stats)
}

/// Run exactly one cycle and return the rendered message log.
///
/// A failed poll is already in the log as an Error notification, so it is
/// not an error here.
pub async fn run_once(monitor: &RemoteRunMonitor) -> String {
    match monitor.poll_once_and_notify().await {
        Ok(count) => info!("Single poll finished: {count} build(s)"),
        Err(e) => warn!("Single poll failed: {e}"),
    }
    monitor.message_log().render()
}
