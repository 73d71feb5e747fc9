//! Unit tests for individual components

mod builders_test;
mod config_test;
mod error_test;
mod log_format_test;
mod log_source_test;
mod runtime_test;
