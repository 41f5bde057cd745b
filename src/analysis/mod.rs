//! Leaderboard statistics.
//!
//! Read-only projections over the merged gang views, shared by the
//! report generator and the daily report capture.

pub mod aggregator;

pub use aggregator::*;
