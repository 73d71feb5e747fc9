//! Time-ordered, blocking handoff queue between the schedule and dispatchers.
//!
//! # Design
//!
//! - **Ordered**: a min-heap keyed by `(scheduled_at, sequence)`, so events come
//!   out in non-decreasing fire time regardless of insertion order
//! - **No polling**: `take_next` parks on a `Notify` until an event arrives or
//!   the queue is sealed
//! - **At-most-once**: an event leaves the heap under the lock, so exactly one
//!   caller receives it
//! - **Accounting**: every taken event counts as in flight until `mark_done`

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::ScheduledEvent;

/// Heap entry ordering the earliest fire time first (reversed for max-heap).
struct DueEntry {
    event: ScheduledEvent,
}

impl PartialEq for DueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DueEntry {}

impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier fire time wins; ties fall back to log order.
        other
            .event
            .scheduled_at()
            .cmp(&self.event.scheduled_at())
            .then_with(|| other.event.sequence().cmp(&self.event.sequence()))
    }
}

struct QueueState {
    heap: BinaryHeap<DueEntry>,
    in_flight: usize,
    /// No further events will be enqueued.
    sealed: bool,
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.sealed && self.heap.is_empty() && self.in_flight == 0
    }
}

/// Thread-safe queue of scheduled events, always yielding the earliest first.
pub struct DueQueue {
    state: Mutex<QueueState>,
    /// Signalled when an event becomes available or the queue is sealed.
    available: Notify,
    /// Signalled whenever the queue may have become drained.
    drained: Notify,
}

impl std::fmt::Debug for DueQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DueQueue")
            .field("pending", &state.heap.len())
            .field("in_flight", &state.in_flight)
            .field("sealed", &state.sealed)
            .finish()
    }
}

impl Default for DueQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DueQueue {
    /// Create an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                in_flight: 0,
                sealed: false,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Bulk-load a complete schedule and seal the queue.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = ScheduledEvent>,
    {
        let heap: BinaryHeap<DueEntry> =
            events.into_iter().map(|event| DueEntry { event }).collect();
        Self {
            state: Mutex::new(QueueState {
                heap,
                in_flight: 0,
                sealed: true,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Insert an event, keeping fire-time order. Returns `false` once sealed.
    pub fn enqueue(&self, event: ScheduledEvent) -> bool {
        {
            let mut state = self.state.lock();
            if state.sealed {
                tracing::warn!(sequence = event.sequence(), "enqueue on sealed due queue ignored");
                return false;
            }
            state.heap.push(DueEntry { event });
        }
        self.available.notify_one();
        true
    }

    /// Declare that no more events will be enqueued.
    pub fn seal(&self) {
        self.state.lock().sealed = true;
        self.available.notify_waiters();
        self.drained.notify_waiters();
    }

    /// Seal the queue and discard everything still pending.
    ///
    /// Returns the number of discarded events. In-flight events are unaffected.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.state.lock();
            state.sealed = true;
            let n = state.heap.len();
            state.heap.clear();
            n
        };
        self.available.notify_waiters();
        self.drained.notify_waiters();
        discarded
    }

    /// Remove and return the earliest event without waiting.
    pub fn try_take(&self) -> Option<ScheduledEvent> {
        let mut state = self.state.lock();
        let entry = state.heap.pop()?;
        state.in_flight += 1;
        Some(entry.event)
    }

    /// Wait for the earliest event.
    ///
    /// Returns `None` once the queue is sealed and empty. Cancel-safe: an event
    /// is only removed in the same poll that returns it.
    pub async fn take_next(&self) -> Option<ScheduledEvent> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(entry) = state.heap.pop() {
                    state.in_flight += 1;
                    return Some(entry.event);
                }
                if state.sealed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Record that a taken event reached a terminal outcome.
    pub fn mark_done(&self) {
        let drained = {
            let mut state = self.state.lock();
            if state.in_flight == 0 {
                tracing::error!("mark_done called with no events in flight");
                return;
            }
            state.in_flight -= 1;
            state.in_flight == 0
        };
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Wait until the queue is sealed, empty, and nothing is in flight.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let drained = self.state.lock().is_drained();
            if drained {
                return;
            }

            notified.await;
        }
    }

    /// Pending (not yet taken) events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Whether no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    /// Events taken but not yet marked done.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Whether the queue has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed
    }

    /// Whether the queue is sealed, empty, and has nothing in flight.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.state.lock().is_drained()
    }

    /// Fire time of the earliest pending event.
    #[must_use]
    pub fn peek_scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().heap.peek().map(|e| e.event.scheduled_at())
    }

    /// Lag of the head event at `now` (positive = overdue and still untaken).
    #[must_use]
    pub fn head_lag(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.peek_scheduled_at().map(|at| now - at)
    }
}
