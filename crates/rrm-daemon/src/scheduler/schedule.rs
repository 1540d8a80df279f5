//! Trigger schedules and overlap policy

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upstream default: every 10 seconds
pub const DEFAULT_SCHEDULE: &str = "0/10 * * * * ?";

/// Longest accepted `@every` interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(31 * 24 * 60 * 60);

/// Schedule parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule expression is empty")]
    Empty,

    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error("invalid interval '{expr}': {message}")]
    InvalidInterval { expr: String, message: String },

    #[error("unknown overlap policy '{0}' (expected skip, queue or concurrent)")]
    UnknownOverlapPolicy(String),
}

/// When the scheduler fires
#[derive(Clone)]
pub enum CronSchedule {
    /// Quartz-style cron expression with a seconds field
    Cron {
        expr: String,
        schedule: Box<cron::Schedule>,
    },
    /// Fixed interval (`@every 10s`)
    Every(Duration),
}

impl CronSchedule {
    /// Parse a schedule expression.
    ///
    /// Accepts 6/7-field cron (seconds first, Quartz `?` allowed), 5-field
    /// cron (seconds assumed 0), `@hourly`-style aliases and `@every <n><unit>`
    /// with unit `ms`, `s`, `m` or `h`.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ScheduleError::Empty);
        }

        if let Some(rest) = expr.strip_prefix("@every") {
            return parse_every(expr, rest.trim()).map(Self::Every);
        }

        let normalized = normalize_cron(expr);
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
                expr: expr.to_string(),
                message: e.to_string(),
            })?;

        if schedule.upcoming(Utc).next().is_none() {
            return Err(ScheduleError::InvalidCron {
                expr: expr.to_string(),
                message: "expression never fires".to_string(),
            });
        }

        Ok(Self::Cron {
            expr: expr.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// Next cron instant strictly after `after`; `None` for interval schedules
    /// or exhausted expressions.
    pub fn next_cron_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron { schedule, .. } => schedule.after(&after).next(),
            Self::Every(_) => None,
        }
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron { expr, .. } => f.debug_tuple("Cron").field(expr).finish(),
            Self::Every(d) => f.debug_tuple("Every").field(d).finish(),
        }
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron { expr, .. } => f.write_str(expr),
            Self::Every(d) => write!(f, "@every {d:?}"),
        }
    }
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Default for CronSchedule {
    fn default() -> Self {
        Self::Every(Duration::from_secs(10))
    }
}

fn normalize_cron(expr: &str) -> String {
    if expr.starts_with('@') {
        return expr.to_string();
    }
    let fields: Vec<&str> = expr
        .split_whitespace()
        .map(|f| if f == "?" { "*" } else { f })
        .collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

fn parse_every(expr: &str, spec: &str) -> Result<Duration, ScheduleError> {
    let invalid = |message: &str| ScheduleError::InvalidInterval {
        expr: expr.to_string(),
        message: message.to_string(),
    };

    let split = spec
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| invalid("missing unit (ms, s, m, h)"))?;
    let (digits, unit) = spec.split_at(split);
    if digits.is_empty() {
        return Err(invalid("missing number"));
    }
    let too_long = || invalid("interval exceeds 31 days");
    let value: u64 = digits.parse().map_err(|_| too_long())?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(too_long)?),
        "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(too_long)?),
        _ => return Err(invalid("unknown unit (expected ms, s, m, h)")),
    };

    if duration.is_zero() {
        return Err(invalid("interval must be greater than zero"));
    }
    if duration > MAX_INTERVAL {
        return Err(too_long());
    }
    Ok(duration)
}

/// What to do when a firing arrives while a cycle is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Drop the firing
    #[default]
    Skip,
    /// Run firings one after another through a bounded queue
    Queue,
    /// Start another cycle alongside the running one
    Concurrent,
}

impl OverlapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Queue => "queue",
            Self::Concurrent => "concurrent",
        }
    }
}

impl FromStr for OverlapPolicy {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "queue" => Ok(Self::Queue),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(ScheduleError::UnknownOverlapPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_quartz_default() {
        let schedule = CronSchedule::parse(DEFAULT_SCHEDULE).unwrap();
        assert_eq!(schedule.to_string(), DEFAULT_SCHEDULE);

        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 3).unwrap();
        let next = schedule.next_cron_after(start).unwrap();
        assert_eq!(next.second(), 10);
        let after = schedule.next_cron_after(next).unwrap();
        assert_eq!(after.second(), 20);
    }

    #[test]
    fn test_parse_five_field_cron() {
        let schedule = CronSchedule::parse("0/5 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 1, 30).unwrap();
        let next = schedule.next_cron_after(start).unwrap();
        assert_eq!((next.minute(), next.second()), (5, 0));
    }

    #[test]
    fn test_parse_every() {
        assert!(matches!(
            CronSchedule::parse("@every 10s").unwrap(),
            CronSchedule::Every(d) if d == Duration::from_secs(10)
        ));
        assert!(matches!(
            CronSchedule::parse("@every 250ms").unwrap(),
            CronSchedule::Every(d) if d == Duration::from_millis(250)
        ));
        assert!(matches!(
            CronSchedule::parse("@every 2m").unwrap(),
            CronSchedule::Every(d) if d == Duration::from_secs(120)
        ));
        assert!(CronSchedule::parse("@every 5s").unwrap().next_cron_after(Utc::now()).is_none());
    }

    #[test]
    fn test_parse_every_rejects_bad_intervals() {
        for bad in ["@every", "@every 10", "@every s", "@every 0s", "@every 3d"] {
            assert!(
                matches!(
                    CronSchedule::parse(bad),
                    Err(ScheduleError::InvalidInterval { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_every_rejects_oversized_intervals() {
        for bad in [
            "@every 18446744073709551615s",
            "@every 99999999999999999999s",
            "@every 18446744073709551615h",
            "@every 745h",
        ] {
            match CronSchedule::parse(bad) {
                Err(ScheduleError::InvalidInterval { message, .. }) => {
                    assert!(message.contains("31 days"), "{bad}: {message}");
                }
                other => panic!("{bad}: expected InvalidInterval, got {other:?}"),
            }
        }

        assert!(matches!(
            CronSchedule::parse("@every 744h").unwrap(),
            CronSchedule::Every(d) if d == MAX_INTERVAL
        ));
    }

    #[test]
    fn test_parse_invalid_cron() {
        assert!(matches!(CronSchedule::parse("  "), Err(ScheduleError::Empty)));
        assert!(matches!(
            CronSchedule::parse("not a cron"),
            Err(ScheduleError::InvalidCron { .. })
        ));
        assert!(matches!(
            CronSchedule::parse("1 2 3"),
            Err(ScheduleError::InvalidCron { .. })
        ));
    }

    #[test]
    fn test_overlap_policy_parse() {
        assert_eq!("skip".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Skip);
        assert_eq!(" Queue ".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Queue);
        assert_eq!(
            "CONCURRENT".parse::<OverlapPolicy>().unwrap(),
            OverlapPolicy::Concurrent
        );
        assert_eq!(OverlapPolicy::default(), OverlapPolicy::Skip);
        assert!("parallel".parse::<OverlapPolicy>().is_err());
    }
}
