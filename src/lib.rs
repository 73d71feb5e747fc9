//! # Log Replay
//!
//! Replays an HTTP access log against a live target, reproducing the original
//! inter-arrival timing.
//!
//! Every replayable line becomes a [`core::ScheduledEvent`] whose fire time is
//! its original timestamp shifted so the earliest entry fires a short delay
//! after start. Events sit in a [`core::DueQueue`] ordered by fire time. A pool
//! of [`core::Dispatcher`]s takes events, sleeps until each one is due and
//! sends it through a [`core::RequestSink`]. A [`core::PoolController`] watches
//! how late events are being picked up and grows the pool when dispatch falls
//! behind, or shrinks it after a quiet period. The run ends when the
//! [`core::CompletionBarrier`] sees every event reach a terminal outcome.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use log_replay::builders::ReplayBuilder;
//! use log_replay::config::ReplayConfig;
//! use log_replay::infra::{read_log_file, HttpSink, LogFormat};
//!
//! let config = ReplayConfig::new("http://localhost:8080");
//! let format = LogFormat::compile(&config.log_format)?;
//! let log = read_log_file("access.log", &format, &config.date_format)?;
//! let sink = HttpSink::new(&config.base_url, &config.user_agent, None)?;
//!
//! let replay = ReplayBuilder::new(config)
//!     .entries(log.entries)
//!     .skipped(log.skipped)
//!     .sink(sink)
//!     .build()?;
//! let shutdown = replay.shutdown_handle();
//! let report = replay.run().await;
//! println!("{} succeeded", report.stats.succeeded);
//! ```
//!
//! `runtime::run_from_config` wraps the same steps for the command-line tool.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Schedule building, the due queue, dispatchers and the pool controller.
pub mod core;
/// Run and pool configuration.
pub mod config;
/// Builders to construct replay runs.
pub mod builders;
/// Log format compiler, log reader and HTTP sink.
pub mod infra;
/// Runtime adapters and the replay API surface.
pub mod runtime;
/// Clock and telemetry utilities.
pub mod util;
