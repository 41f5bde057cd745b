//! Error types for the tracker core and its collaborators.

use thiserror::Error;

/// Every failure here degrades to "skip this tick, state unchanged".
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The source could not deliver a sample.
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A sample arrived but is not a well-formed ranked list.
    #[error("malformed sample: {0}")]
    MalformedSample(String),

    /// Civil time could not be computed or went backwards.
    #[error("clock anomaly: {0}")]
    ClockAnomaly(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
