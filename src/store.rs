//! JSON persistence of tracker state.
//!
//! State is written after every successful tick. Whether it is read back on
//! startup is a configuration choice (`restore_on_startup`); by default the
//! tracker starts fresh.

use crate::tracker::AggregationState;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk envelope.
#[derive(Debug, Serialize, Deserialize)]
struct SavedState {
    saved_at: DateTime<Utc>,
    state: AggregationState,
}

/// Reads and writes the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the configured path, or `None` when saving is disabled.
    pub fn from_config(state_file: &str) -> Option<Self> {
        let trimmed = state_file.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::new(trimmed))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved state. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<AggregationState>> {
        if !self.path.exists() {
            debug!("No state file at {}", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;
        let saved: SavedState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        info!(
            "Restored state saved at {} ({} gangs)",
            saved.saved_at,
            saved.state.gangs.len()
        );
        Ok(Some(saved.state))
    }

    /// Save state, replacing the previous file atomically.
    pub fn save(&self, state: &AggregationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let saved = SavedState {
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&saved).context("Failed to serialize state")?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        debug!("State saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawGang;
    use crate::tracker::{AggregationEngine, TrackerSettings};
    use chrono::{Duration, TimeZone};

    fn populated_state() -> AggregationState {
        let mut engine = AggregationEngine::new(TrackerSettings::default());
        let start = Utc.with_ymd_and_hms(2025, 6, 4, 6, 0, 0).unwrap();
        engine
            .tick_at(vec![RawGang::new("A", 1000, 2), RawGang::new("B", 400, 1)], start)
            .unwrap();
        engine
            .tick_at(
                vec![RawGang::new("A", 1500, 2), RawGang::new("B", 450, 1)],
                start + Duration::minutes(1),
            )
            .unwrap();
        engine.state().clone()
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/state.json"));
        let state = populated_state();

        store.save(&state).unwrap();
        let restored = store.load().unwrap().unwrap();

        assert_eq!(restored, state);
        assert_eq!(restored.weekly.accumulated("A"), 500);
        assert!(restored.clocks.daily.last_reset().is_some());
        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(StateStore::new(&path).load().is_err());
    }

    #[test]
    fn test_from_config_empty_disables() {
        assert!(StateStore::from_config("").is_none());
        assert!(StateStore::from_config("   ").is_none());
        assert_eq!(
            StateStore::from_config("data/state.json").unwrap().path(),
            Path::new("data/state.json")
        );
    }
}
