//! Bounded, shared log of delivered notifications

use super::types::NotificationEvent;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default number of entries kept in memory
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// One appended notification
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Monotonic sequence number, starting at 1
    pub seq: u64,
    pub event: NotificationEvent,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
    dropped: u64,
}

/// Thread-safe append-only log with an explicit capacity.
///
/// When full, the oldest entry is evicted and counted as dropped.
#[derive(Debug)]
pub struct MessageLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl MessageLog {
    /// Capacity is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
                next_seq: 1,
                dropped: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append an event; returns its sequence number
    pub fn append(&self, event: NotificationEvent) -> u64 {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
            inner.dropped += 1;
        }
        inner.entries.push_back(LogEntry { seq, event });
        seq
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Entries evicted so far
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Copy of the retained entries, oldest first
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Plain-text rendering, one block per entry separated by blank lines
    pub fn render(&self) -> String {
        let inner = self.lock();
        let mut out = String::new();
        if inner.dropped > 0 {
            out.push_str(&format!("({} earlier messages dropped)\n\n", inner.dropped));
        }
        for entry in &inner.entries {
            out.push_str(&format!(
                "[{}] {}: {}\n\n",
                entry.event.timestamp.format("%H:%M:%S"),
                entry.event.title,
                entry.event.body
            ));
        }
        out
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::{EventKind, Severity};
    use chrono::Utc;
    use std::sync::Arc;

    fn event(body: &str) -> NotificationEvent {
        NotificationEvent {
            kind: EventKind::BuildGeneric,
            severity: Severity::Info,
            title: "Build status".to_string(),
            body: body.to_string(),
            build: None,
            action: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_assigns_sequence_numbers() {
        let log = MessageLog::new(10);
        assert!(log.is_empty());
        assert_eq!(log.append(event("one")), 1);
        assert_eq!(log.append(event("two")), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.snapshot()[1].event.body, "two");
    }

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let log = MessageLog::new(2);
        for body in ["a", "b", "c", "d"] {
            log.append(event(body));
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].event.body, "c");
        assert_eq!(snapshot[0].seq, 3);
        assert_eq!(log.dropped(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = MessageLog::new(0);
        assert_eq!(log.capacity(), 1);
        log.append(event("a"));
        log.append(event("b"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_render_mentions_drops() {
        let log = MessageLog::new(1);
        log.append(event("first"));
        log.append(event("second"));

        let text = log.render();
        assert!(text.starts_with("(1 earlier messages dropped)"));
        assert!(text.contains("Build status: second"));
        assert!(!text.contains("first"));
    }

    #[test]
    fn test_concurrent_appends() {
        let log = Arc::new(MessageLog::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.append(event(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let seqs: Vec<u64> = log.snapshot().iter().map(|e| e.seq).collect();
        assert_eq!(seqs.len(), 200);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }
}
