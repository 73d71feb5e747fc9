//! Parsed log entries and the scheduled events derived from them.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One replayable request extracted from the log, before rebasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based line number in the source log; unique and increasing.
    pub line_number: u64,
    /// Original request time, with the offset recorded in the log.
    pub timestamp: DateTime<FixedOffset>,
    /// Path (and query) to request.
    pub resource: String,
    /// Original client identity, forwarded to the target.
    pub identity: String,
}

impl LogEntry {
    /// Convenience constructor.
    pub fn new(
        line_number: u64,
        timestamp: DateTime<FixedOffset>,
        resource: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            timestamp,
            resource: resource.into(),
            identity: identity.into(),
        }
    }
}

/// A request with its rebased fire time. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    sequence: u64,
    target: String,
    scheduled_at: DateTime<Utc>,
    origin: String,
}

impl ScheduledEvent {
    /// Build an event from an entry and its rebased time.
    #[must_use]
    pub fn from_entry(entry: LogEntry, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            sequence: entry.line_number,
            target: entry.resource,
            scheduled_at,
            origin: entry.identity,
        }
    }

    /// Position in the original log.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Resource path to request.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Absolute time at which the event fires.
    #[must_use]
    pub const fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// Client identity forwarded to the sink.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl fmt::Display for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event #{}: {} @ {} to \"{}\"",
            self.sequence, self.origin, self.scheduled_at, self.target
        )
    }
}
