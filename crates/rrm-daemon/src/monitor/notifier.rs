//! Notification delivery: message log plus pluggable sinks

use super::message_log::MessageLog;
use super::types::{NotificationEvent, Severity};
use remote_run_monitor_core::event_log::{EventFields, EventLog};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Sink delivery failure
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink {sink} rejected event: {message}")]
    Rejected { sink: String, message: String },
}

/// Destination for rendered notifications
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError>;
}

/// Emits one tracing line per notification
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        let body = event.body.replace('\n', " | ");
        match event.severity {
            Severity::Info => info!("[{}] {}: {}", event.kind, event.title, body),
            Severity::Error => error!("[{}] {}: {}", event.kind, event.title, body),
        }
        Ok(())
    }
}

/// Mirrors notifications into the rotating JSONL event log
#[derive(Debug)]
pub struct EventLogSink {
    log: Arc<EventLog>,
}

impl EventLogSink {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }
}

impl NotificationSink for EventLogSink {
    fn name(&self) -> &str {
        "event_log"
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        let (level, error) = match event.severity {
            Severity::Info => ("info", None),
            Severity::Error => ("error", Some(event.body.clone())),
        };
        self.log.append(EventFields {
            level,
            source: "rrm-daemon",
            action: event.kind.as_str(),
            build_id: event.build.as_ref().map(|b| b.id.clone()),
            branch: event.build.as_ref().map(|b| b.branch.clone()),
            state: event.build.as_ref().map(|b| b.state.to_string()),
            url: event.action.as_ref().map(|a| a.url.clone()),
            error,
            message_text: Some(format!("{}: {}", event.title, event.body)),
        })?;
        Ok(())
    }
}

/// Appends every event to the message log, then fans it out to the sinks
#[derive(Debug)]
pub struct Notifier {
    log: Arc<MessageLog>,
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self {
            log,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }

    /// Deliver one event. Sink failures are logged and swallowed.
    pub fn notify(&self, event: NotificationEvent) {
        self.log.append(event.clone());
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(&event) {
                warn!("Notification sink {} failed: {e}", sink.name());
            }
        }
    }

    pub fn notify_all(&self, events: impl IntoIterator<Item = NotificationEvent>) {
        for event in events {
            self.notify(event);
        }
    }
}
