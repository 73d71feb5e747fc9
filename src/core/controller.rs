//! Pool controller: the single authority over the dispatcher pool size.
//!
//! Dispatchers report lag samples to a shared [`LagMonitor`]; the controller
//! wakes on a fixed interval, merges those samples with the lag of the
//! untaken head of the [`DueQueue`], and asks its [`ScalingPolicy`] whether to
//! grow, shrink or hold. Growth is bounded by `max_workers`, shrinking by
//! `min_workers`, and shrinking only happens after an idle window.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::TimeDelta;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::core::{Dispatcher, DueQueue, ReplayCounters, RequestSink};
use crate::runtime::Spawn;
use crate::util::clock::{delta_secs, Clock};

/// Worst lag reported by dispatchers since the controller last looked.
#[derive(Debug, Default)]
pub struct LagMonitor {
    worst: Mutex<Option<TimeDelta>>,
}

impl LagMonitor {
    /// Record a sample; only the worst (largest) lag is kept.
    pub fn report(&self, lag: TimeDelta) {
        let mut worst = self.worst.lock();
        *worst = Some(worst.map_or(lag, |w| w.max(lag)));
    }

    /// Take the worst sample and reset.
    pub fn take(&self) -> Option<TimeDelta> {
        self.worst.lock().take()
    }
}

/// Inputs to one scaling evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LagSignal {
    /// Worst lag reported by dispatchers since the previous evaluation.
    pub dispatcher_lag: Option<TimeDelta>,
    /// Lag of the earliest event still waiting in the queue.
    pub head_lag: Option<TimeDelta>,
    /// Events not yet taken by any dispatcher.
    pub pending: usize,
}

impl LagSignal {
    /// The larger of the two samples.
    #[must_use]
    pub fn worst(&self) -> Option<TimeDelta> {
        match (self.dispatcher_lag, self.head_lag) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// What the controller should do after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Start one more dispatcher.
    Grow,
    /// Retire one dispatcher.
    Shrink,
    /// Leave the pool as it is.
    Hold,
}

/// Bounded grow/shrink policy driven by lag and idleness.
#[derive(Debug, Clone)]
pub struct ScalingPolicy {
    tolerance: TimeDelta,
    min_workers: usize,
    max_workers: usize,
    idle_window: Duration,
    idle_since: Option<Instant>,
}

impl ScalingPolicy {
    /// Build the policy from pool configuration.
    #[must_use]
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            tolerance: config.tolerance(),
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            idle_window: config.idle_window(),
            idle_since: None,
        }
    }

    /// Whether a lag sample is outside tolerance.
    ///
    /// The sample's lead time (`scheduled - now`, i.e. `-lag`) must not drop
    /// below the tolerance. With a negative tolerance that allows the given
    /// lateness; with a positive one it demands that much head start.
    #[must_use]
    pub fn breaches(&self, lag: TimeDelta) -> bool {
        -lag < self.tolerance
    }

    /// Decide one step for a pool of `live` dispatchers at `now`.
    pub fn decide(&mut self, signal: &LagSignal, now: Instant, live: usize) -> ScaleDecision {
        if signal.worst().is_some_and(|lag| self.breaches(lag)) {
            self.idle_since = None;
            return if live < self.max_workers {
                ScaleDecision::Grow
            } else {
                ScaleDecision::Hold
            };
        }

        // Idle means nothing reported and nothing left to take.
        if signal.dispatcher_lag.is_some() || signal.pending > 0 {
            self.idle_since = None;
            return ScaleDecision::Hold;
        }

        let since = *self.idle_since.get_or_insert(now);
        if live > self.min_workers && now.duration_since(since) >= self.idle_window {
            // Restart the window so the pool steps down one dispatcher at a time.
            self.idle_since = Some(now);
            return ScaleDecision::Shrink;
        }
        ScaleDecision::Hold
    }
}

struct WorkerHandle {
    retire: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Owns the live dispatchers and resizes the pool.
pub struct PoolController<K, S>
where
    K: RequestSink,
    S: Spawn,
{
    config: PoolConfig,
    policy: ScalingPolicy,
    queue: Arc<DueQueue>,
    sink: Arc<K>,
    monitor: Arc<LagMonitor>,
    counters: Arc<ReplayCounters>,
    clock: Arc<dyn Clock>,
    spawner: S,
    shutdown: watch::Receiver<bool>,
    workers: BTreeMap<usize, WorkerHandle>,
    retired: Vec<JoinHandle<()>>,
    next_worker_id: usize,
}

impl<K, S> PoolController<K, S>
where
    K: RequestSink,
    S: Spawn,
{
    /// Create a controller; no dispatchers run until [`Self::start`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PoolConfig,
        queue: Arc<DueQueue>,
        sink: Arc<K>,
        counters: Arc<ReplayCounters>,
        clock: Arc<dyn Clock>,
        spawner: S,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            policy: ScalingPolicy::new(&config),
            config,
            queue,
            sink,
            monitor: Arc::new(LagMonitor::default()),
            counters,
            clock,
            spawner,
            shutdown,
            workers: BTreeMap::new(),
            retired: Vec::new(),
            next_worker_id: 0,
        }
    }

    /// Live dispatchers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Shared lag monitor the dispatchers report into.
    #[must_use]
    pub fn monitor(&self) -> Arc<LagMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Start the initial dispatchers.
    pub fn start(&mut self) {
        for _ in 0..self.config.initial_workers {
            self.spawn_worker();
        }
        info!(
            worker_count = self.worker_count(),
            min_workers = self.config.min_workers,
            max_workers = self.config.max_workers,
            "dispatcher pool started"
        );
    }

    fn spawn_worker(&mut self) -> bool {
        if self.workers.len() >= self.config.max_workers {
            return false;
        }
        let id = self.next_worker_id;
        self.next_worker_id += 1;

        let dispatcher = Dispatcher::new(
            id,
            Arc::clone(&self.queue),
            Arc::clone(&self.sink),
            Arc::clone(&self.monitor),
            Arc::clone(&self.counters),
            Arc::clone(&self.clock),
            self.shutdown.clone(),
        );
        let (retire, retire_rx) = oneshot::channel();
        let join = self.spawner.spawn(dispatcher.run(retire_rx));
        self.workers.insert(id, WorkerHandle { retire, join });
        self.counters.worker_started();
        true
    }

    fn retire_worker(&mut self) -> bool {
        if self.workers.len() <= self.config.min_workers {
            return false;
        }
        let Some((id, handle)) = self.workers.pop_last() else {
            return false;
        };
        // A dispatcher mid-event picks this up once the event is done.
        let _ = handle.retire.send(());
        self.retired.push(handle.join);
        self.counters.worker_retired();
        debug!(worker_id = id, "dispatcher retirement requested");
        true
    }

    /// Run one scaling evaluation and apply the decision.
    pub fn evaluate(&mut self, now: Instant) -> ScaleDecision {
        if *self.shutdown.borrow() {
            return ScaleDecision::Hold;
        }
        let signal = LagSignal {
            dispatcher_lag: self.monitor.take(),
            head_lag: self.queue.head_lag(self.clock.now()),
            pending: self.queue.len(),
        };
        let decision = self.policy.decide(&signal, now, self.worker_count());
        match decision {
            ScaleDecision::Grow => {
                if self.spawn_worker() {
                    warn!(
                        lag_secs = signal.worst().map_or(0.0, delta_secs),
                        pending = signal.pending,
                        worker_count = self.worker_count(),
                        "dispatch is falling behind schedule, added a dispatcher"
                    );
                }
            }
            ScaleDecision::Shrink => {
                if self.retire_worker() {
                    info!(worker_count = self.worker_count(), "pool idle, retired a dispatcher");
                }
            }
            ScaleDecision::Hold => {
                if signal.worst().is_some_and(|lag| self.policy.breaches(lag)) {
                    debug!(
                        worker_count = self.worker_count(),
                        "lag over tolerance but pool is at max_workers"
                    );
                }
            }
        }
        decision
    }

    /// Scale the pool until the queue drains, then retire every dispatcher.
    pub async fn run(mut self) {
        if self.workers.is_empty() {
            self.start();
        }

        let mut ticker = tokio::time::interval(self.config.sample_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.queue.wait_drained() => break,
                _ = ticker.tick() => {
                    self.evaluate(Instant::now());
                }
            }
        }

        self.retire_all().await;
    }

    /// Stop every dispatcher and wait for them to exit.
    async fn retire_all(&mut self) {
        // Idle dispatchers wake with `None` once the queue is closed.
        self.queue.close();
        let live = std::mem::take(&mut self.workers);
        let count = live.len();
        for (_, handle) in live {
            let _ = handle.retire.send(());
            self.retired.push(handle.join);
            self.counters.worker_retired();
        }
        for join in self.retired.drain(..) {
            if let Err(e) = join.await {
                warn!(error = %e, "dispatcher task ended abnormally");
            }
        }
        info!(retired = count, "dispatcher pool shut down");
    }
}
