//! Graceful shutdown coordination

use crate::scheduler::{SchedulerHandle, SchedulerStats};
use anyhow::Result;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Stop the scheduler, waiting up to `shutdown_timeout` for in-flight cycles.
///
/// # Errors
///
/// Returns an error if the in-flight cycles outlast the timeout.
pub async fn graceful_shutdown(
    handle: SchedulerHandle,
    shutdown_timeout: Duration,
) -> Result<SchedulerStats> {
    info!(
        "Beginning graceful shutdown (timeout: {:?})",
        shutdown_timeout
    );

    match timeout(shutdown_timeout, handle.stop()).await {
        Ok(stats) => {
            info!("Scheduler shut down cleanly");
            Ok(stats)
        }
        Err(_) => {
            warn!("Scheduler shutdown timed out after {:?}", shutdown_timeout);
            anyhow::bail!("in-flight poll cycle did not finish within {shutdown_timeout:?}")
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
pub fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
                        _ = sigterm.recv() => info!("Received SIGTERM"),
                    }
                }
                Err(e) => {
                    error!("Failed to create SIGTERM handler: {e}");
                    if let Err(e) = ctrl_c.await {
                        error!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    info!("Received SIGINT (Ctrl+C)");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = ctrl_c.await {
                error!("Failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Received Ctrl+C");
        }

        cancel.cancel();
    });
}
