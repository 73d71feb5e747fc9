//! Error types for replay operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::infra::log_format::FormatError;

/// Run-level errors. Any of these aborts the replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// No replayable entries survived parsing, so there is nothing to schedule.
    #[error("schedule is empty: no replayable entries")]
    EmptySchedule,
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The log source could not be opened or read.
    #[error("log source {path:?} unavailable: {source}")]
    LogSource {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The log format description could not be compiled.
    #[error("log format error: {0}")]
    Format(#[from] FormatError),
    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(String),
}

/// Per-event dispatch failures. These are contained by the dispatcher and
/// never abort the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Timeout or peer disconnect; logged as a warning, no retry.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Anything else; logged as an error with full context.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl DispatchError {
    /// Whether this failure is a timeout/disconnect class failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
