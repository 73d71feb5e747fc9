//! Replay and pool configuration structures.
//!
//! Configuration is an immutable value: it is validated once, then handed to
//! the schedule builder, the controller and the sink at construction time.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::util::clock::secs_to_delta;

/// Apache `%t` timestamp layout.
pub const APACHE_DATE_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Apache "combined" access log format.
pub const APACHE_COMBINED_FORMAT: &str =
    "%h %l %u %t \"%r\" %>s %O \"%{Referer}i\" \"%{User-Agent}i\"";

/// Agent header sent with every replayed request.
pub const DEFAULT_USER_AGENT: &str = "log_replay";

/// Dispatcher pool bounds and scaling policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Dispatchers started before the first event fires.
    pub initial_workers: usize,
    /// Floor the pool never shrinks below.
    pub min_workers: usize,
    /// Ceiling the pool never grows above.
    pub max_workers: usize,
    /// Signed tolerance in seconds, compared against `scheduled - now`.
    /// A sample whose lead time falls below it triggers growth.
    pub maximum_time_delta_secs: f64,
    /// Interval between controller evaluations, in milliseconds.
    pub sample_interval_ms: u64,
    /// Consecutive idle time before one dispatcher is retired, in milliseconds.
    pub idle_window_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_workers: 50,
            min_workers: 1,
            max_workers: 500,
            maximum_time_delta_secs: -0.5,
            sample_interval_ms: 250,
            idle_window_ms: 5_000,
        }
    }
}

impl PoolConfig {
    /// Builder-style setter for all three worker bounds.
    #[must_use]
    pub const fn with_workers(mut self, min: usize, initial: usize, max: usize) -> Self {
        self.min_workers = min;
        self.initial_workers = initial;
        self.max_workers = max;
        self
    }

    /// Builder-style setter for the lag tolerance.
    #[must_use]
    pub const fn with_maximum_time_delta(mut self, secs: f64) -> Self {
        self.maximum_time_delta_secs = secs;
        self
    }

    /// Builder-style setter for the controller timings.
    #[must_use]
    pub const fn with_timings(mut self, sample_interval_ms: u64, idle_window_ms: u64) -> Self {
        self.sample_interval_ms = sample_interval_ms;
        self.idle_window_ms = idle_window_ms;
        self
    }

    /// Tolerance as a chrono delta.
    #[must_use]
    pub fn tolerance(&self) -> TimeDelta {
        secs_to_delta(self.maximum_time_delta_secs)
    }

    /// Controller evaluation interval.
    #[must_use]
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Idle hysteresis window.
    #[must_use]
    pub const fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_workers == 0 {
            return Err("min_workers must be greater than 0".into());
        }
        if self.min_workers > self.max_workers {
            return Err(format!(
                "min_workers ({}) must not exceed max_workers ({})",
                self.min_workers, self.max_workers
            ));
        }
        if self.initial_workers < self.min_workers || self.initial_workers > self.max_workers {
            return Err(format!(
                "initial_workers ({}) must be within [{}, {}]",
                self.initial_workers, self.min_workers, self.max_workers
            ));
        }
        if !self.maximum_time_delta_secs.is_finite() {
            return Err("maximum_time_delta_secs must be a finite number".into());
        }
        if self.sample_interval_ms == 0 {
            return Err("sample_interval_ms must be greater than 0".into());
        }
        if self.idle_window_ms == 0 {
            return Err("idle_window_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Upper bound on the start delay: one week.
pub const MAX_START_DELAY_SECS: u64 = 7 * 24 * 60 * 60;

/// Root replay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Target server prefix, e.g. `https://staging.example.com`.
    pub base_url: String,
    /// Seconds between building the schedule and the earliest event.
    #[serde(default = "default_start_delay")]
    pub start_delay_secs: u64,
    /// Apache `LogFormat` description of the input lines.
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// `strftime` layout of the `%t` field.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Optional total timeout per request, in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Dispatcher pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
}

const fn default_start_delay() -> u64 {
    1
}

fn default_log_format() -> String {
    APACHE_COMBINED_FORMAT.to_string()
}

fn default_date_format() -> String {
    APACHE_DATE_FORMAT.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl ReplayConfig {
    /// Configuration with defaults for everything but the target.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            start_delay_secs: default_start_delay(),
            log_format: default_log_format(),
            date_format: default_date_format(),
            user_agent: default_user_agent(),
            request_timeout_secs: None,
            pool: PoolConfig::default(),
        }
    }

    /// Builder-style setter for the start delay.
    #[must_use]
    pub fn with_start_delay_secs(mut self, secs: u64) -> Self {
        self.start_delay_secs = secs;
        self
    }

    /// Builder-style setter for the pool settings.
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Start delay as a duration.
    #[must_use]
    pub const fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    /// Per-request timeout, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the target, formats and pool.
    pub fn validate(&self) -> Result<(), String> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err("base_url must not be empty".into());
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(format!("base_url `{base}` must start with http:// or https://"));
        }
        if self.log_format.trim().is_empty() {
            return Err("log_format must not be empty".into());
        }
        if self.date_format.trim().is_empty() {
            return Err("date_format must not be empty".into());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".into());
        }
        if self.start_delay_secs > MAX_START_DELAY_SECS {
            return Err(format!(
                "start_delay_secs must be at most {MAX_START_DELAY_SECS}, got {}",
                self.start_delay_secs
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err("request_timeout_secs must be greater than 0".into());
        }
        self.pool
            .validate()
            .map_err(|e| format!("pool invalid: {e}"))
    }

    /// Parse replay configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
