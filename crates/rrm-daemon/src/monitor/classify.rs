//! Build classification and message rendering

use super::error::PollError;
use super::types::{
    Build, BuildRef, BuildState, EventKind, NotificationAction, NotificationEvent, PolledBuild,
    Severity,
};
use chrono::Utc;

const OPEN_BUILD_LABEL: &str = "Open build";

/// "Build found" event for a build observed this cycle.
///
/// Emitted every time the build is seen, not only the first time.
pub fn found_event(build: &Build) -> NotificationEvent {
    let adjective = match build.state {
        BuildState::Running => "running",
        BuildState::Finished => "completed",
        BuildState::Deleted => "deleted",
        BuildState::Queued => "queued",
        BuildState::Unknown => "unknown",
    };

    NotificationEvent {
        kind: EventKind::BuildFound,
        severity: Severity::Info,
        title: "Build found".to_string(),
        body: format!(
            "Found {adjective} build {} (branch {})",
            build.id, build.branch
        ),
        build: Some(build_ref(build, &build.branch)),
        action: None,
        timestamp: Utc::now(),
    }
}

/// Classify a build into exactly one running/failed/generic event.
///
/// Running wins over a failed status since it is checked first.
pub fn classify(build: &Build, branch: &str) -> NotificationEvent {
    let details = format!("Status: {}\nLink: {}", build.status_text, build.home_url);

    let (kind, severity, title, body) = if build.state == BuildState::Running {
        (
            EventKind::BuildRunning,
            Severity::Info,
            "Build running",
            format!("Build for branch {branch} running.\n{details}"),
        )
    } else if build.status.is_failed() {
        (
            EventKind::BuildFailed,
            Severity::Error,
            "Build failed",
            format!("Build for branch {branch} just finished.\n{details}"),
        )
    } else {
        (
            EventKind::BuildGeneric,
            Severity::Info,
            "Build status",
            format!("Build for branch {branch}.\n{details}"),
        )
    };

    NotificationEvent {
        kind,
        severity,
        title: title.to_string(),
        body,
        build: Some(build_ref(build, branch)),
        action: open_build_action(build),
        timestamp: Utc::now(),
    }
}

/// Error event for a failed poll cycle
pub fn error_event(err: &PollError) -> NotificationEvent {
    NotificationEvent {
        kind: EventKind::PollFailed,
        severity: Severity::Error,
        title: "Error".to_string(),
        body: err.to_string(),
        build: None,
        action: None,
        timestamp: Utc::now(),
    }
}

/// Error event for a cycle that panicked
pub fn panic_event(operation: &str, message: &str) -> NotificationEvent {
    NotificationEvent {
        kind: EventKind::PollFailed,
        severity: Severity::Error,
        title: "Error".to_string(),
        body: format!("{operation} panicked: {message}"),
        build: None,
        action: None,
        timestamp: Utc::now(),
    }
}

/// Events for one cycle: per build, the found event then its classification
pub fn cycle_events(results: &[PolledBuild]) -> Vec<NotificationEvent> {
    results
        .iter()
        .flat_map(|polled| [found_event(&polled.build), classify(&polled.build, &polled.branch)])
        .collect()
}

fn build_ref(build: &Build, branch: &str) -> BuildRef {
    BuildRef {
        id: build.id.clone(),
        branch: branch.to_string(),
        state: build.state,
    }
}

fn open_build_action(build: &Build) -> Option<NotificationAction> {
    (!build.home_url.is_empty()).then(|| NotificationAction {
        label: OPEN_BUILD_LABEL.to_string(),
        url: build.home_url.clone(),
    })
}
