//! Completion barrier: resolves once every scheduled event is terminal.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{DueQueue, ReplayCounters};

/// Waits for the run to finish.
///
/// Completion means the queue is sealed, nothing is pending and no event is
/// held by a dispatcher. Every event has then either produced an outcome or
/// been discarded by a shutdown.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    queue: Arc<DueQueue>,
    counters: Arc<ReplayCounters>,
}

impl CompletionBarrier {
    /// Barrier over `queue`, reporting progress from `counters`.
    #[must_use]
    pub const fn new(queue: Arc<DueQueue>, counters: Arc<ReplayCounters>) -> Self {
        Self { queue, counters }
    }

    /// Whether the run has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.queue.is_drained()
    }

    /// Events not yet terminal.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        let stats = self.counters.snapshot();
        stats.scheduled.saturating_sub(stats.terminal_outcomes())
    }

    /// Wait until the run has finished.
    pub async fn wait(&self) {
        self.queue.wait_drained().await;
    }

    /// Wait at most `limit`. Returns `true` if the run finished in time.
    pub async fn wait_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DispatchOutcome, LogEntry, ScheduledEvent};
    use chrono::{FixedOffset, Utc};

    fn event(seq: u64) -> ScheduledEvent {
        let now = Utc::now();
        let ts = now.with_timezone(&FixedOffset::east_opt(0).unwrap());
        ScheduledEvent::from_entry(LogEntry::new(seq, ts, "/", "a"), now)
    }

    #[tokio::test]
    async fn test_barrier_waits_for_in_flight_events() {
        let queue = Arc::new(DueQueue::from_events(vec![event(1), event(2)]));
        let counters = Arc::new(ReplayCounters::default());
        counters.set_scheduled(2);
        let barrier = CompletionBarrier::new(Arc::clone(&queue), Arc::clone(&counters));

        let first = queue.try_take().unwrap();
        let second = queue.try_take().unwrap();
        assert!(queue.is_empty());
        assert!(!barrier.is_complete());
        assert!(!barrier.wait_timeout(Duration::from_millis(30)).await);

        drop(first);
        counters.record_outcome(&DispatchOutcome::Completed(200));
        queue.mark_done();
        assert_eq!(barrier.outstanding(), 1);
        assert!(!barrier.is_complete());

        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait().await })
        };
        drop(second);
        counters.record_outcome(&DispatchOutcome::Discarded);
        queue.mark_done();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(barrier.is_complete());
        assert_eq!(barrier.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_empty_sealed_queue_is_complete() {
        let queue = Arc::new(DueQueue::from_events(Vec::new()));
        let barrier = CompletionBarrier::new(queue, Arc::new(ReplayCounters::default()));
        assert!(barrier.is_complete());
        assert!(barrier.wait_timeout(Duration::from_millis(10)).await);
    }
}
