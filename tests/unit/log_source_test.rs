//! Tests for reading access logs from disk

use std::io::Write;

use log_replay::config::{APACHE_COMBINED_FORMAT, APACHE_DATE_FORMAT};
use log_replay::core::ReplayError;
use log_replay::infra::{read_log_file, LogFormat};

fn combined() -> LogFormat {
    LogFormat::compile(APACHE_COMBINED_FORMAT).unwrap()
}

#[test]
fn test_read_log_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"192.0.2.1 - - [05/Mar/2024:10:00:02 +0000] "GET /b HTTP/1.1" 200 10 "-" "ua""#
    )
    .unwrap();
    writeln!(
        file,
        r#"192.0.2.2 - - [05/Mar/2024:10:00:00 +0000] "GET /a HTTP/1.1" 200 10 "-" "ua""#
    )
    .unwrap();
    writeln!(
        file,
        r#"192.0.2.3 - - [05/Mar/2024:10:00:01 +0000] "DELETE /c HTTP/1.1" 204 0 "-" "ua""#
    )
    .unwrap();
    file.write_all(b"\xff\xfe not utf8 at all\n").unwrap();
    file.flush().unwrap();

    let log = read_log_file(file.path(), &combined(), APACHE_DATE_FORMAT).unwrap();

    assert_eq!(log.lines, 4);
    assert_eq!(log.entries.len(), 2);
    assert_eq!(log.entries[0].line_number, 1);
    assert_eq!(log.entries[0].resource, "/b");
    assert_eq!(log.entries[1].identity, "192.0.2.2");
    assert_eq!(log.skipped.unsupported_method, 1);
    assert_eq!(log.skipped.unmatched, 1);
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.log");
    let err = read_log_file(&path, &combined(), APACHE_DATE_FORMAT).unwrap_err();
    match err {
        ReplayError::LogSource { path: p, .. } => assert_eq!(p, path),
        other => panic!("expected log source error, got {other:?}"),
    }
}

#[test]
fn test_format_without_time_is_rejected() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let format = LogFormat::compile("%h \"%r\"").unwrap();
    let err = read_log_file(file.path(), &format, APACHE_DATE_FORMAT).unwrap_err();
    assert!(matches!(err, ReplayError::InvalidConfig(_)));
}

#[test]
fn test_empty_file_yields_no_entries() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let log = read_log_file(file.path(), &combined(), APACHE_DATE_FORMAT).unwrap();
    assert!(log.entries.is_empty());
    assert_eq!(log.skipped.total(), 0);
}
