//! Tests for configuration validation

use log_replay::config::{
    PoolConfig, ReplayConfig, APACHE_COMBINED_FORMAT, APACHE_DATE_FORMAT, DEFAULT_USER_AGENT,
    MAX_START_DELAY_SECS,
};

#[test]
fn test_defaults() {
    let config = ReplayConfig::new("http://localhost:8080");
    assert_eq!(config.start_delay_secs, 1);
    assert_eq!(config.log_format, APACHE_COMBINED_FORMAT);
    assert_eq!(config.date_format, APACHE_DATE_FORMAT);
    assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(config.request_timeout(), None);
    assert_eq!(config.pool.initial_workers, 50);
    assert!((config.pool.maximum_time_delta_secs - -0.5).abs() < f64::EPSILON);
    assert!(config.validate().is_ok());
}

#[test]
fn test_pool_config_validation() {
    assert!(PoolConfig::default().validate().is_ok());
    assert!(PoolConfig::default().with_workers(0, 1, 4).validate().is_err());
    assert!(PoolConfig::default().with_workers(5, 5, 4).validate().is_err());
    assert!(PoolConfig::default().with_workers(2, 1, 4).validate().is_err());
    assert!(PoolConfig::default().with_workers(2, 5, 4).validate().is_err());
    assert!(PoolConfig::default().with_workers(4, 4, 4).validate().is_ok());
}

#[test]
fn test_pool_config_invalid_tolerance_and_timings() {
    assert!(PoolConfig::default()
        .with_maximum_time_delta(f64::NAN)
        .validate()
        .is_err());
    assert!(PoolConfig::default().with_timings(0, 100).validate().is_err());
    assert!(PoolConfig::default().with_timings(100, 0).validate().is_err());
    assert!(PoolConfig::default()
        .with_maximum_time_delta(0.25)
        .validate()
        .is_ok());
}

#[test]
fn test_replay_config_rejects_bad_target() {
    assert!(ReplayConfig::new("").validate().is_err());
    assert!(ReplayConfig::new("localhost:8080").validate().is_err());
    assert!(ReplayConfig::new("ftp://example.com").validate().is_err());
    assert!(ReplayConfig::new("https://example.com").validate().is_ok());
}

#[test]
fn test_replay_config_bounds_start_delay() {
    let at_limit =
        ReplayConfig::new("http://localhost").with_start_delay_secs(MAX_START_DELAY_SECS);
    assert!(at_limit.validate().is_ok());

    let err = ReplayConfig::new("http://localhost")
        .with_start_delay_secs(10_000_000_000_000)
        .validate()
        .unwrap_err();
    assert!(err.contains("start_delay_secs"), "{err}");
}

#[test]
fn test_replay_config_rejects_zero_timeout_and_bad_pool() {
    let mut config = ReplayConfig::new("http://localhost");
    config.request_timeout_secs = Some(0);
    assert!(config.validate().is_err());

    let config = ReplayConfig::new("http://localhost")
        .with_pool(PoolConfig::default().with_workers(10, 5, 20));
    let err = config.validate().unwrap_err();
    assert!(err.starts_with("pool invalid"));
}

#[test]
fn test_from_json_str_applies_defaults() {
    let config = ReplayConfig::from_json_str(
        r#"{ "base_url": "http://127.0.0.1:9000", "pool": { "initial_workers": 4, "max_workers": 8 } }"#,
    )
    .unwrap();
    assert_eq!(config.base_url, "http://127.0.0.1:9000");
    assert_eq!(config.start_delay_secs, 1);
    assert_eq!(config.pool.initial_workers, 4);
    assert_eq!(config.pool.max_workers, 8);
    assert_eq!(config.pool.min_workers, 1);
    assert_eq!(config.pool.sample_interval_ms, 250);
}

#[test]
fn test_from_json_str_validates() {
    assert!(ReplayConfig::from_json_str("not json").is_err());
    let err = ReplayConfig::from_json_str(
        r#"{ "base_url": "http://127.0.0.1", "pool": { "min_workers": 0 } }"#,
    )
    .unwrap_err();
    assert!(err.contains("min_workers"));
}
