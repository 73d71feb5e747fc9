//! Runtime adapters and the top-level replay API.

pub mod api;
pub mod tokio_spawner;

pub use api::{run_from_config, Replay, ReplayReport, ShutdownHandle};
pub use tokio_spawner::{Spawn, TokioSpawner};
