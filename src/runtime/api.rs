//! Replay runs: executing a built schedule, shutdown, and the final report.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::builders::ReplayBuilder;
use crate::config::ReplayConfig;
use crate::core::{
    CompletionBarrier, DueQueue, PoolController, ReplayCounters, ReplayError, ReplayStats,
    RequestSink,
};
use crate::infra::{read_log_file, HttpSink, LogFormat, SkipCounts};
use crate::runtime::{Spawn, TokioSpawner};
use crate::util::clock::Clock;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Identifier of this run, also attached to its tracing span.
    pub run_id: Uuid,
    /// Final statistics.
    pub stats: ReplayStats,
    /// Log lines left out of the schedule.
    pub skipped: SkipCounts,
    /// Wall time from start of dispatch to completion.
    pub elapsed_ms: u64,
    /// Whether the run was cut short by a shutdown request.
    pub shutdown_requested: bool,
}

impl ReplayReport {
    /// Whether every scheduled event reached a terminal outcome.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.stats.terminal_outcomes() == self.stats.scheduled
    }
}

/// Requests an early end to a run. Cloneable and usable from any task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    queue: Arc<DueQueue>,
    counters: Arc<ReplayCounters>,
}

impl ShutdownHandle {
    /// Stop the run: pending events are discarded, dispatchers sleeping toward
    /// a fire time abandon their event, and requests already issued complete.
    ///
    /// Returns `true` for the first request, `false` for repeats.
    pub fn shutdown(&self) -> bool {
        if self.tx.send_replace(true) {
            return false;
        }
        let discarded = self.queue.close();
        self.counters.record_discarded(discarded);
        info!(discarded, in_flight = self.queue.in_flight(), "shutdown requested");
        true
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A built run, ready to execute.
pub struct Replay<K: RequestSink> {
    pub(crate) run_id: Uuid,
    pub(crate) config: ReplayConfig,
    pub(crate) queue: Arc<DueQueue>,
    pub(crate) sink: Arc<K>,
    pub(crate) counters: Arc<ReplayCounters>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) skipped: SkipCounts,
    pub(crate) shutdown: Arc<watch::Sender<bool>>,
}

impl<K: RequestSink> std::fmt::Debug for Replay<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replay")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("counters", &self.counters)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl<K: RequestSink> Replay<K> {
    /// Identifier of this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Events in the schedule.
    #[must_use]
    pub fn scheduled(&self) -> u64 {
        self.counters.scheduled()
    }

    /// Handle for requesting an early shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
            queue: Arc::clone(&self.queue),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Live statistics, readable while the run is in progress.
    #[must_use]
    pub fn counters(&self) -> Arc<ReplayCounters> {
        Arc::clone(&self.counters)
    }

    /// Barrier that releases when every event is terminal.
    #[must_use]
    pub fn barrier(&self) -> CompletionBarrier {
        CompletionBarrier::new(Arc::clone(&self.queue), Arc::clone(&self.counters))
    }

    /// Run on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub async fn run(self) -> ReplayReport {
        self.run_with(TokioSpawner::current()).await
    }

    /// Run, spawning the controller and dispatchers through `spawner`.
    pub async fn run_with<S: Spawn + Clone>(self, spawner: S) -> ReplayReport {
        let span = info_span!("replay", run_id = %self.run_id);
        self.execute(spawner).instrument(span).await
    }

    async fn execute<S: Spawn + Clone>(self, spawner: S) -> ReplayReport {
        let started = Instant::now();
        let barrier = self.barrier();
        info!(
            scheduled = self.scheduled(),
            skipped = self.skipped.total(),
            initial_workers = self.config.pool.initial_workers,
            "replay starting"
        );

        let mut controller = PoolController::new(
            self.config.pool.clone(),
            Arc::clone(&self.queue),
            Arc::clone(&self.sink),
            Arc::clone(&self.counters),
            Arc::clone(&self.clock),
            spawner.clone(),
            self.shutdown.subscribe(),
        );
        controller.start();
        let pool = spawner.spawn(controller.run().in_current_span());

        barrier.wait().await;
        if let Err(e) = pool.await {
            warn!(error = %e, "pool controller ended abnormally");
        }

        let stats = self.counters.snapshot();
        let report = ReplayReport {
            run_id: self.run_id,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            skipped: self.skipped,
            shutdown_requested: *self.shutdown.borrow(),
            stats,
        };
        info!(
            succeeded = report.stats.succeeded,
            failed = report.stats.failed(),
            discarded = report.stats.discarded,
            late = report.stats.late_dispatches,
            worst_lag_ms = report.stats.worst_lag_ms,
            peak_workers = report.stats.peak_workers,
            elapsed_ms = report.elapsed_ms,
            "replay finished"
        );
        report
    }
}

/// Full pipeline: compile the format, read `log_file`, and replay it against
/// `config.base_url`. The run is shut down early if `shutdown` resolves.
///
/// # Errors
///
/// Any [`ReplayError`] raised before dispatch starts.
pub async fn run_from_config<F>(
    config: ReplayConfig,
    log_file: impl AsRef<Path>,
    shutdown: F,
) -> Result<ReplayReport, ReplayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate().map_err(ReplayError::InvalidConfig)?;
    let format = LogFormat::compile(&config.log_format)?;
    let log = read_log_file(log_file, &format, &config.date_format)?;
    let sink = HttpSink::new(&config.base_url, &config.user_agent, config.request_timeout())?;

    let replay = ReplayBuilder::new(config)
        .entries(log.entries)
        .skipped(log.skipped)
        .sink(sink)
        .build()?;

    let handle = replay.shutdown_handle();
    let watcher = tokio::spawn(async move {
        shutdown.await;
        handle.shutdown();
    });

    let report = replay.run().await;
    watcher.abort();
    Ok(report)
}
