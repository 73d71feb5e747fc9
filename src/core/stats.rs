//! Run statistics shared between dispatchers and the pool controller.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

use chrono::TimeDelta;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::DispatchError;

/// Terminal outcome of one scheduled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The target answered with this status code.
    Completed(u16),
    /// The request failed and was abandoned.
    Failed(DispatchError),
    /// The event was dropped by a shutdown before its request was issued.
    Discarded,
}

/// Snapshot of replay statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Events loaded into the schedule.
    pub scheduled: u64,
    /// Requests that produced a response status.
    pub succeeded: u64,
    /// Requests abandoned after a timeout or disconnect.
    pub transient_failures: u64,
    /// Requests abandoned after any other failure.
    pub unexpected_failures: u64,
    /// Events dropped by a shutdown request.
    pub discarded: u64,
    /// Requests issued after their scheduled time had already passed.
    pub late_dispatches: u64,
    /// Largest observed lag in milliseconds.
    pub worst_lag_ms: i64,
    /// Live dispatchers.
    pub worker_count: usize,
    /// Largest pool size reached.
    pub peak_workers: usize,
    /// Dispatchers started over the run.
    pub spawned_workers: u64,
    /// Dispatchers retired by the controller.
    pub retired_workers: u64,
    /// Response count per status code.
    pub statuses: BTreeMap<u16, u64>,
}

impl ReplayStats {
    /// Events that reached any terminal outcome.
    #[must_use]
    pub const fn terminal_outcomes(&self) -> u64 {
        self.succeeded + self.transient_failures + self.unexpected_failures + self.discarded
    }

    /// Requests that failed in either class.
    #[must_use]
    pub const fn failed(&self) -> u64 {
        self.transient_failures + self.unexpected_failures
    }
}

/// Internal counters for replay statistics (thread-safe).
#[derive(Debug)]
pub struct ReplayCounters {
    scheduled: AtomicU64,
    succeeded: AtomicU64,
    transient_failures: AtomicU64,
    unexpected_failures: AtomicU64,
    discarded: AtomicU64,
    late_dispatches: AtomicU64,
    worst_lag_ms: AtomicI64,
    worker_count: AtomicUsize,
    peak_workers: AtomicUsize,
    spawned_workers: AtomicU64,
    retired_workers: AtomicU64,
    statuses: Mutex<BTreeMap<u16, u64>>,
}

impl Default for ReplayCounters {
    fn default() -> Self {
        Self {
            scheduled: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            transient_failures: AtomicU64::new(0),
            unexpected_failures: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            late_dispatches: AtomicU64::new(0),
            worst_lag_ms: AtomicI64::new(i64::MIN),
            worker_count: AtomicUsize::new(0),
            peak_workers: AtomicUsize::new(0),
            spawned_workers: AtomicU64::new(0),
            retired_workers: AtomicU64::new(0),
            statuses: Mutex::new(BTreeMap::new()),
        }
    }
}

impl ReplayCounters {
    /// Record the size of the loaded schedule.
    pub fn set_scheduled(&self, n: usize) {
        self.scheduled.store(n as u64, Ordering::Relaxed);
    }

    /// Total events in the schedule.
    #[must_use]
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// Record the terminal outcome of one event.
    pub fn record_outcome(&self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Completed(status) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                *self.statuses.lock().entry(*status).or_insert(0) += 1;
            }
            DispatchOutcome::Failed(DispatchError::Transient(_)) => {
                self.transient_failures.fetch_add(1, Ordering::Relaxed);
            }
            DispatchOutcome::Failed(DispatchError::Unexpected(_)) => {
                self.unexpected_failures.fetch_add(1, Ordering::Relaxed);
            }
            DispatchOutcome::Discarded => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Count events dropped from the queue without being taken.
    pub fn record_discarded(&self, n: usize) {
        self.discarded.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record the lag of a dispatched event.
    pub fn record_lag(&self, lag: TimeDelta) {
        if lag > TimeDelta::zero() {
            self.late_dispatches.fetch_add(1, Ordering::Relaxed);
        }
        self.worst_lag_ms.fetch_max(lag.num_milliseconds(), Ordering::Relaxed);
    }

    /// A dispatcher joined the pool.
    pub fn worker_started(&self) {
        let live = self.worker_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_workers.fetch_max(live, Ordering::AcqRel);
        self.spawned_workers.fetch_add(1, Ordering::Relaxed);
    }

    /// A dispatcher was asked to leave the pool.
    pub fn worker_retired(&self) {
        self.worker_count.fetch_sub(1, Ordering::AcqRel);
        self.retired_workers.fetch_add(1, Ordering::Relaxed);
    }

    /// Live dispatchers as seen by the controller.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Acquire)
    }

    /// Get a snapshot of current statistics.
    #[must_use]
    pub fn snapshot(&self) -> ReplayStats {
        let worst = self.worst_lag_ms.load(Ordering::Relaxed);
        ReplayStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            unexpected_failures: self.unexpected_failures.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            late_dispatches: self.late_dispatches.load(Ordering::Relaxed),
            worst_lag_ms: if worst == i64::MIN { 0 } else { worst },
            worker_count: self.worker_count.load(Ordering::Acquire),
            peak_workers: self.peak_workers.load(Ordering::Acquire),
            spawned_workers: self.spawned_workers.load(Ordering::Relaxed),
            retired_workers: self.retired_workers.load(Ordering::Relaxed),
            statuses: self.statuses.lock().clone(),
        }
    }
}
