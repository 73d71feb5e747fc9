//! Builder assembling a [`Replay`] from configuration and parsed entries.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::config::ReplayConfig;
use crate::core::{build_schedule, LogEntry, ReplayCounters, ReplayError, RequestSink};
use crate::infra::SkipCounts;
use crate::runtime::Replay;
use crate::util::clock::{Clock, SystemClock};

/// Builds a [`Replay`] run.
///
/// ```rust,ignore
/// let replay = ReplayBuilder::new(config)
///     .entries(log.entries)
///     .skipped(log.skipped)
///     .sink(HttpSink::new(&base_url, "log_replay", None)?)
///     .build()?;
/// let report = replay.run().await;
/// ```
pub struct ReplayBuilder<K: RequestSink> {
    config: ReplayConfig,
    entries: Vec<LogEntry>,
    skipped: SkipCounts,
    sink: Option<K>,
    clock: Arc<dyn Clock>,
}

impl<K: RequestSink> ReplayBuilder<K> {
    /// Start from `config` with no entries, no sink and the system clock.
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            skipped: SkipCounts::default(),
            sink: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Entries to replay, in any order.
    #[must_use]
    pub fn entries(mut self, entries: Vec<LogEntry>) -> Self {
        self.entries = entries;
        self
    }

    /// Parse skips to carry into the final report.
    #[must_use]
    pub const fn skipped(mut self, skipped: SkipCounts) -> Self {
        self.skipped = skipped;
        self
    }

    /// Where requests are sent.
    #[must_use]
    pub fn sink(mut self, sink: K) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Time source for scheduling and lag measurement.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and build the schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::InvalidConfig`] for an invalid configuration or a
    /// missing sink, and [`ReplayError::EmptySchedule`] when there is nothing
    /// to replay.
    pub fn build(self) -> Result<Replay<K>, ReplayError> {
        self.config.validate().map_err(ReplayError::InvalidConfig)?;
        let sink = self
            .sink
            .ok_or_else(|| ReplayError::InvalidConfig("no request sink configured".into()))?;

        let queue = build_schedule(self.entries, self.config.start_delay(), self.clock.now())?;
        let counters = Arc::new(ReplayCounters::default());
        counters.set_scheduled(queue.len());
        let (shutdown, _) = watch::channel(false);

        Ok(Replay {
            run_id: Uuid::new_v4(),
            config: self.config,
            queue: Arc::new(queue),
            sink: Arc::new(sink),
            counters,
            clock: self.clock,
            skipped: self.skipped,
            shutdown: Arc::new(shutdown),
        })
    }
}
