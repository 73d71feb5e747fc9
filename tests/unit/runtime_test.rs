//! Tests for the tokio spawner and the replay report

use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use log_replay::builders::ReplayBuilder;
use log_replay::config::{PoolConfig, ReplayConfig};
use log_replay::core::{DispatchError, LogEntry, RequestSink, ScheduledEvent};
use log_replay::runtime::tokio_spawner::{Spawn, TokioSpawner};
use log_replay::runtime::ReplayReport;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
    handle.await.unwrap();
}

struct SlowSink;

#[async_trait]
impl RequestSink for SlowSink {
    async fn send(&self, _event: &ScheduledEvent) -> Result<u16, DispatchError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(200)
    }
}

fn entries(n: u64) -> Vec<LogEntry> {
    let base = Utc::now().with_timezone(&FixedOffset::east_opt(3600).unwrap());
    (1..=n)
        .map(|i| LogEntry::new(i, base, format!("/item/{i}"), "192.0.2.44"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_handle_is_idempotent() {
    let config = ReplayConfig::new("http://localhost")
        .with_start_delay_secs(60)
        .with_pool(PoolConfig::default().with_workers(1, 2, 4));
    let replay = ReplayBuilder::new(config)
        .entries(entries(3))
        .sink(SlowSink)
        .build()
        .unwrap();

    let handle = replay.shutdown_handle();
    let other = handle.clone();
    assert!(!handle.is_requested());

    let run = tokio::spawn(replay.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.shutdown());
    assert!(!other.shutdown());
    assert!(other.is_requested());

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run ends after shutdown")
        .unwrap();
    assert!(report.shutdown_requested);
    assert_eq!(report.stats.discarded, 3);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_report_round_trips_through_json() {
    let config = ReplayConfig::new("http://localhost")
        .with_start_delay_secs(0)
        .with_pool(PoolConfig::default().with_workers(1, 1, 1));
    let replay = ReplayBuilder::new(config)
        .entries(entries(2))
        .sink(SlowSink)
        .build()
        .unwrap();
    let report = replay.run().await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["stats"]["succeeded"], 2);
    assert_eq!(json["stats"]["statuses"]["200"], 2);
    assert_eq!(json["shutdown_requested"], false);

    let back: ReplayReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}
