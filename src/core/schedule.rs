//! Rebasing parsed log entries onto a live schedule.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::core::{DueQueue, LogEntry, ReplayError, ScheduledEvent};

/// Sort `entries` by original time and shift them so the earliest fires at
/// `now + start_delay`, preserving every gap exactly.
///
/// # Errors
///
/// Returns [`ReplayError::EmptySchedule`] when `entries` is empty and
/// [`ReplayError::InvalidConfig`] when the delay or a rebased timestamp cannot
/// be represented.
pub fn rebase(
    mut entries: Vec<LogEntry>,
    start_delay: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<ScheduledEvent>, ReplayError> {
    if entries.is_empty() {
        return Err(ReplayError::EmptySchedule);
    }

    // Stable sort keeps log order for identical timestamps.
    entries.sort_by_key(|e| e.timestamp);

    let delay = TimeDelta::from_std(start_delay)
        .map_err(|e| ReplayError::InvalidConfig(format!("start delay out of range: {e}")))?;
    let earliest = entries[0].timestamp.with_timezone(&Utc);
    let start = now
        .checked_add_signed(delay)
        .ok_or_else(|| ReplayError::InvalidConfig(format!("start delay of {delay} overflows")))?;
    let offset = start - earliest;

    tracing::info!(
        entries = entries.len(),
        earliest = %earliest,
        offset_secs = offset.num_seconds(),
        "rebasing schedule"
    );

    entries
        .into_iter()
        .map(|entry| {
            let at = entry
                .timestamp
                .with_timezone(&Utc)
                .checked_add_signed(offset)
                .ok_or_else(|| {
                    ReplayError::InvalidConfig(format!(
                        "line {} cannot be rebased: timestamp out of range",
                        entry.line_number
                    ))
                })?;
            Ok(ScheduledEvent::from_entry(entry, at))
        })
        .collect()
}

/// Rebase `entries` and load them into a sealed [`DueQueue`].
///
/// # Errors
///
/// Same as [`rebase`].
pub fn build_schedule(
    entries: Vec<LogEntry>,
    start_delay: Duration,
    now: DateTime<Utc>,
) -> Result<DueQueue, ReplayError> {
    let events = rebase(entries, start_delay, now)?;
    Ok(DueQueue::from_events(events))
}
