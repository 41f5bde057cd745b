//! Snapshot diffing, windowed accumulation and reset scheduling.

pub mod clock;
pub mod diff;
pub mod engine;
pub mod windows;

pub use engine::{AggregationEngine, AggregationState, TrackerSettings};
