//! Tests for builder modules

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, TimeDelta, TimeZone};
use log_replay::builders::ReplayBuilder;
use log_replay::config::{PoolConfig, ReplayConfig};
use log_replay::core::{DispatchError, LogEntry, ReplayError, RequestSink, ScheduledEvent};
use log_replay::infra::SkipCounts;
use log_replay::util::OffsetClock;

struct NullSink;

#[async_trait]
impl RequestSink for NullSink {
    async fn send(&self, _event: &ScheduledEvent) -> Result<u16, DispatchError> {
        Ok(200)
    }
}

fn entry(line: u64, secs: i64) -> LogEntry {
    let ts = FixedOffset::west_opt(4 * 3600)
        .unwrap()
        .timestamp_opt(1_650_000_000 + secs, 0)
        .unwrap();
    LogEntry::new(line, ts, format!("/{line}"), "203.0.113.5")
}

#[test]
fn test_builder_validates_config() {
    let config = ReplayConfig::new("http://localhost")
        .with_pool(PoolConfig::default().with_workers(3, 2, 4));
    let err = ReplayBuilder::new(config)
        .entries(vec![entry(1, 0)])
        .sink(NullSink)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ReplayError::InvalidConfig(_)));
}

#[test]
fn test_builder_produces_unique_run_ids() {
    let build = || {
        ReplayBuilder::new(ReplayConfig::new("http://localhost"))
            .entries(vec![entry(1, 0), entry(2, 3)])
            .skipped(SkipCounts {
                unmatched: 2,
                ..SkipCounts::default()
            })
            .sink(NullSink)
            .build()
            .unwrap()
    };
    let a = build();
    let b = build();
    assert_ne!(a.run_id(), b.run_id());
    assert_eq!(a.scheduled(), 2);
    assert_eq!(a.counters().snapshot().scheduled, 2);
}

#[tokio::test]
async fn test_builder_uses_supplied_clock() {
    // Schedule and dispatch both read the skewed clock, so nothing looks late.
    let skew = TimeDelta::hours(-3);
    let config = ReplayConfig::new("http://localhost")
        .with_start_delay_secs(0)
        .with_pool(PoolConfig::default().with_workers(1, 1, 2));
    let replay = ReplayBuilder::new(config)
        .entries(vec![entry(1, 0)])
        .sink(NullSink)
        .clock(Arc::new(OffsetClock::new(skew)))
        .build()
        .unwrap();
    assert!(!replay.barrier().is_complete());
    assert_eq!(replay.barrier().outstanding(), 1);

    let report = replay.run().await;
    assert_eq!(report.stats.succeeded, 1);
    assert!(report.stats.worst_lag_ms < 1_000);
}
