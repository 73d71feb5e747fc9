//! Dispatcher: the unit of work in the elastic pool.
//!
//! Each dispatcher takes one event at a time from the [`DueQueue`], waits for
//! its fire time, hands it to the [`RequestSink`], and records the outcome.
//! Failures are contained here: whatever the sink returns, the event is marked
//! done and the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, warn};

use crate::core::{
    DispatchError, DispatchOutcome, DueQueue, LagMonitor, ReplayCounters, ScheduledEvent,
};
use crate::util::clock::{delta_secs, Clock};

/// Destination for replayed requests.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use log_replay::core::{DispatchError, RequestSink, ScheduledEvent};
///
/// struct Discard;
///
/// #[async_trait]
/// impl RequestSink for Discard {
///     async fn send(&self, _event: &ScheduledEvent) -> Result<u16, DispatchError> {
///         Ok(204)
///     }
/// }
/// ```
#[async_trait]
pub trait RequestSink: Send + Sync + 'static {
    /// Issue the request for `event` and return the response status.
    async fn send(&self, event: &ScheduledEvent) -> Result<u16, DispatchError>;
}

#[async_trait]
impl<T: RequestSink> RequestSink for Arc<T> {
    async fn send(&self, event: &ScheduledEvent) -> Result<u16, DispatchError> {
        (**self).send(event).await
    }
}

/// Resolve once a shutdown has been broadcast. Never resolves if the sender is
/// gone without having requested one.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// One dispatcher in the pool.
pub struct Dispatcher<K: RequestSink> {
    id: usize,
    queue: Arc<DueQueue>,
    sink: Arc<K>,
    monitor: Arc<LagMonitor>,
    counters: Arc<ReplayCounters>,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
}

impl<K: RequestSink> Dispatcher<K> {
    /// Create a dispatcher sharing the given run state.
    pub fn new(
        id: usize,
        queue: Arc<DueQueue>,
        sink: Arc<K>,
        monitor: Arc<LagMonitor>,
        counters: Arc<ReplayCounters>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            queue,
            sink,
            monitor,
            counters,
            clock,
            shutdown,
        }
    }

    /// Identifier assigned by the controller.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Drain events until the queue is exhausted or `retire` fires.
    ///
    /// Retirement is only honoured between events, never while one is held.
    pub async fn run(mut self, mut retire: oneshot::Receiver<()>) {
        debug!(worker_id = self.id, "dispatcher started");
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut retire => {
                    debug!(worker_id = self.id, "dispatcher retired");
                    break;
                }
                next = self.queue.take_next() => match next {
                    Some(event) => event,
                    None => break,
                },
            };
            self.process(event).await;
        }
        debug!(worker_id = self.id, "dispatcher exiting");
    }

    /// Carry one taken event through to its terminal outcome.
    pub async fn process(&mut self, event: ScheduledEvent) -> DispatchOutcome {
        let lag = self.clock.now() - event.scheduled_at();
        self.monitor.report(lag);

        let outcome = if self.wait_until(event.scheduled_at()).await {
            let dispatched_lag = self.clock.now() - event.scheduled_at();
            self.counters.record_lag(dispatched_lag);
            debug!(
                worker_id = self.id,
                sequence = event.sequence(),
                lag_secs = delta_secs(dispatched_lag),
                "dispatching"
            );
            self.dispatch(&event).await
        } else {
            debug!(
                worker_id = self.id,
                sequence = event.sequence(),
                "shutdown before fire time, event discarded"
            );
            DispatchOutcome::Discarded
        };

        self.counters.record_outcome(&outcome);
        self.queue.mark_done();
        outcome
    }

    /// Sleep until `at`. Returns `false` if a shutdown interrupted the wait.
    async fn wait_until(&mut self, at: DateTime<Utc>) -> bool {
        loop {
            let remaining = at - self.clock.now();
            if remaining <= chrono::TimeDelta::zero() {
                return true;
            }
            let nap = remaining.to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                () = tokio::time::sleep(nap) => {}
                () = shutdown_requested(&mut self.shutdown) => return false,
            }
        }
    }

    async fn dispatch(&self, event: &ScheduledEvent) -> DispatchOutcome {
        match self.sink.send(event).await {
            Ok(status) => {
                debug!(
                    worker_id = self.id,
                    sequence = event.sequence(),
                    status,
                    "{event} returned {status}"
                );
                DispatchOutcome::Completed(status)
            }
            Err(err @ DispatchError::Transient(_)) => {
                warn!(
                    worker_id = self.id,
                    sequence = event.sequence(),
                    error = %err,
                    "{event} abandoned"
                );
                DispatchOutcome::Failed(err)
            }
            Err(err @ DispatchError::Unexpected(_)) => {
                error!(
                    worker_id = self.id,
                    sequence = event.sequence(),
                    target = event.target(),
                    origin = event.origin(),
                    scheduled_at = %event.scheduled_at(),
                    error = %err,
                    "{event} raised an unexpected failure"
                );
                DispatchOutcome::Failed(err)
            }
        }
    }
}
