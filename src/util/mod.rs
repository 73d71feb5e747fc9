//! Shared utilities: clock and telemetry.

pub mod clock;
pub mod telemetry;

pub use clock::*;
pub use telemetry::*;
