//! Infrastructure adapters: log format compiler, log reader, HTTP sink.

pub mod http_sink;
pub mod log_format;
pub mod log_source;

pub use http_sink::HttpSink;
pub use log_format::{FieldClass, FieldExtractor, FieldKind, FormatError, LogFormat, ParsedLine};
pub use log_source::{
    check_format, parse_line, parse_lines, parse_timestamp, read_log_file, ParsedLog, SkipCounts,
    SkipReason,
};
