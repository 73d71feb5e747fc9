//! Core scheduling: schedule building, the due queue, dispatchers and the
//! elastic pool controller.

pub mod barrier;
pub mod controller;
pub mod dispatcher;
pub mod due_queue;
pub mod error;
pub mod event;
pub mod schedule;
pub mod stats;

pub use barrier::CompletionBarrier;
pub use controller::{LagMonitor, LagSignal, PoolController, ScaleDecision, ScalingPolicy};
pub use dispatcher::{Dispatcher, RequestSink};
pub use due_queue::DueQueue;
pub use error::{AppResult, DispatchError, ReplayError};
pub use event::{LogEntry, ScheduledEvent};
pub use schedule::{build_schedule, rebase};
pub use stats::{DispatchOutcome, ReplayCounters, ReplayStats};
