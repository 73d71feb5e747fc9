//! Reading an access log into replayable entries.
//!
//! Only `GET` requests are replayed. Lines that do not match the format, or
//! that lack a usable timestamp, resource or client identity, are skipped with
//! a warning and counted by reason.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{LogEntry, ReplayError};
use crate::infra::log_format::{FieldKind, LogFormat, ParsedLine};

/// Why a line was left out of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The line does not match the compiled format.
    Unmatched,
    /// No request line or path could be found.
    MissingRequest,
    /// The request uses a method other than `GET`.
    UnsupportedMethod,
    /// The timestamp does not parse with the configured date format.
    BadTimestamp,
    /// Neither host nor remote address is present.
    MissingIdentity,
}

impl SkipReason {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::MissingRequest => "missing request",
            Self::UnsupportedMethod => "unsupported method",
            Self::BadTimestamp => "bad timestamp",
            Self::MissingIdentity => "missing identity",
        }
    }
}

/// Skipped line counts per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Lines that did not match the format.
    pub unmatched: u64,
    /// Lines without a request.
    pub missing_request: u64,
    /// Non-`GET` requests.
    pub unsupported_method: u64,
    /// Lines with an unparseable timestamp.
    pub bad_timestamp: u64,
    /// Lines without a client identity.
    pub missing_identity: u64,
}

impl SkipCounts {
    /// Count one skipped line.
    pub fn record(&mut self, reason: SkipReason) {
        let slot = match reason {
            SkipReason::Unmatched => &mut self.unmatched,
            SkipReason::MissingRequest => &mut self.missing_request,
            SkipReason::UnsupportedMethod => &mut self.unsupported_method,
            SkipReason::BadTimestamp => &mut self.bad_timestamp,
            SkipReason::MissingIdentity => &mut self.missing_identity,
        };
        *slot += 1;
    }

    /// Total skipped lines.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.unmatched
            + self.missing_request
            + self.unsupported_method
            + self.bad_timestamp
            + self.missing_identity
    }
}

/// Result of reading a log.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    /// Replayable entries in file order.
    pub entries: Vec<LogEntry>,
    /// Lines left out, by reason.
    pub skipped: SkipCounts,
    /// Non-blank lines read.
    pub lines: u64,
}

/// Check that `format` can produce replayable entries at all.
///
/// # Errors
///
/// Returns [`ReplayError::InvalidConfig`] when the format has no `%t` or no
/// way to recover the requested resource.
pub fn check_format(format: &LogFormat) -> Result<(), ReplayError> {
    if !format.has(&FieldKind::Time) {
        return Err(ReplayError::InvalidConfig(format!(
            "log format `{}` has no %t field",
            format.source()
        )));
    }
    if !format.has(&FieldKind::Request) && !format.has(&FieldKind::UrlPath) {
        return Err(ReplayError::InvalidConfig(format!(
            "log format `{}` has neither %r nor %U",
            format.source()
        )));
    }
    Ok(())
}

/// Turn one log line into an entry.
///
/// # Errors
///
/// Returns the reason the line cannot be replayed.
pub fn parse_line(
    format: &LogFormat,
    date_format: &str,
    line_number: u64,
    line: &str,
) -> Result<LogEntry, SkipReason> {
    let parsed = format.extract(line).ok_or(SkipReason::Unmatched)?;
    let resource = get_resource(&parsed)?;
    let raw_time = parsed.get(&FieldKind::Time).ok_or(SkipReason::BadTimestamp)?;
    let timestamp = parse_timestamp(raw_time, date_format).ok_or(SkipReason::BadTimestamp)?;
    let identity = parsed
        .get(&FieldKind::Host)
        .or_else(|| parsed.get(&FieldKind::RemoteIp))
        .filter(|s| !s.is_empty() && *s != "-")
        .ok_or(SkipReason::MissingIdentity)?;

    Ok(LogEntry::new(line_number, timestamp, resource, identity))
}

fn get_resource(parsed: &ParsedLine<'_>) -> Result<String, SkipReason> {
    if let Some(request) = parsed.get(&FieldKind::Request) {
        let mut parts = request.split_whitespace();
        let method = parts.next().ok_or(SkipReason::MissingRequest)?;
        if method == "-" {
            return Err(SkipReason::MissingRequest);
        }
        if method != "GET" {
            return Err(SkipReason::UnsupportedMethod);
        }
        return parts
            .next()
            .map(str::to_string)
            .ok_or(SkipReason::MissingRequest);
    }

    // `%U` without `%m` is taken to be a GET.
    if parsed.get(&FieldKind::Method).is_some_and(|m| m != "GET") {
        return Err(SkipReason::UnsupportedMethod);
    }
    parsed
        .get(&FieldKind::UrlPath)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or(SkipReason::MissingRequest)
}

/// Parse a timestamp with `date_format`. Formats without an offset are read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str, date_format: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, date_format).ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, date_format)
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

/// Parse every line from `reader`. Line numbers are 1-based and count blank lines.
///
/// # Errors
///
/// Propagates read failures.
pub fn parse_lines<R: BufRead>(
    reader: R,
    format: &LogFormat,
    date_format: &str,
) -> io::Result<ParsedLog> {
    let mut log = ParsedLog::default();

    for (index, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let line_number = index as u64 + 1;
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        log.lines += 1;

        match parse_line(format, date_format, line_number, line) {
            Ok(entry) => log.entries.push(entry),
            Err(reason) => {
                warn!(line_number, reason = reason.as_str(), "skipping log line: {line}");
                log.skipped.record(reason);
            }
        }
    }

    Ok(log)
}

/// Open and parse the log at `path`.
///
/// # Errors
///
/// Returns [`ReplayError::LogSource`] when the file cannot be opened or read,
/// and [`ReplayError::InvalidConfig`] when the format cannot yield entries.
pub fn read_log_file(
    path: impl AsRef<Path>,
    format: &LogFormat,
    date_format: &str,
) -> Result<ParsedLog, ReplayError> {
    let path = path.as_ref();
    check_format(format)?;

    let source = |source: io::Error| ReplayError::LogSource {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(source)?;
    let log = parse_lines(BufReader::new(file), format, date_format).map_err(source)?;

    info!(
        path = %path.display(),
        lines = log.lines,
        entries = log.entries.len(),
        skipped = log.skipped.total(),
        "log loaded"
    );
    Ok(log)
}
