//! Builders to construct replay runs from configuration.

pub mod replay_builder;

pub use replay_builder::ReplayBuilder;
