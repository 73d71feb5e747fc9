//! Tests for error types

use std::path::PathBuf;

use log_replay::core::{DispatchError, ReplayError};
use log_replay::infra::FormatError;

#[test]
fn test_empty_schedule_error() {
    let err = ReplayError::EmptySchedule;
    assert_eq!(format!("{err}"), "schedule is empty: no replayable entries");
}

#[test]
fn test_invalid_config_error() {
    let err = ReplayError::InvalidConfig("min_workers must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: min_workers must be greater than 0"
    );
}

#[test]
fn test_log_source_error_keeps_source() {
    let err = ReplayError::LogSource {
        path: PathBuf::from("/missing/access.log"),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    };
    let text = format!("{err}");
    assert!(text.contains("/missing/access.log"));
    assert!(text.contains("no such file"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_format_error_converts() {
    let err: ReplayError = FormatError::UnknownDirective("%Q".into()).into();
    assert_eq!(format!("{err}"), "log format error: unknown directive `%Q`");
}

#[test]
fn test_dispatch_error_classes() {
    let transient = DispatchError::Transient("connection reset".into());
    let unexpected = DispatchError::Unexpected("invalid header".into());
    assert!(transient.is_transient());
    assert!(!unexpected.is_transient());
    assert_eq!(format!("{transient}"), "transient failure: connection reset");
    assert_eq!(format!("{unexpected}"), "unexpected failure: invalid header");
}

#[test]
fn test_replay_error_into_anyhow() {
    let result: log_replay::core::AppResult<()> = Err(ReplayError::EmptySchedule.into());
    let err = result.unwrap_err();
    assert!(err.downcast_ref::<ReplayError>().is_some());
}
