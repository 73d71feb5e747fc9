//! Configuration models for the replay schedule, target and dispatcher pool.

pub mod replay;

pub use replay::{
    PoolConfig, ReplayConfig, APACHE_COMBINED_FORMAT, APACHE_DATE_FORMAT, DEFAULT_USER_AGENT,
    MAX_START_DELAY_SECS,
};
