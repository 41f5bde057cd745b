//! Data models for the gang tracker.
//!
//! This module contains the core data structures shared by the tracker,
//! the sample sources and the report generator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One gang as delivered by the leaderboard source.
///
/// The source's own `rank` field is not a position; it is kept as the
/// gang's opaque level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGang {
    /// Gang name (identity key).
    pub gang_name: String,
    /// Cumulative experience.
    pub xp: u64,
    /// Source-supplied level.
    #[serde(rename = "rank", default)]
    pub level: i64,
}

impl RawGang {
    pub fn new(gang_name: impl Into<String>, xp: u64, level: i64) -> Self {
        Self {
            gang_name: gang_name.into(),
            xp,
            level,
        }
    }
}

/// Response envelope of the leaderboard endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    pub tops: Vec<RawGang>,
}

/// A gang at one sample time, with its derived rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GangSnapshot {
    pub name: String,
    pub xp: u64,
    pub level: i64,
    /// 1-based position after a stable descending sort on `xp`.
    pub rank: usize,
}

/// Per-gang change between two consecutive samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub name: String,
    pub xp_before: u64,
    pub xp_after: u64,
    pub xp_delta: i64,
    pub level_before: i64,
    pub level_after: i64,
    pub level_delta: i64,
    pub rank_before: usize,
    pub rank_after: usize,
    /// Always zero for new gangs.
    pub rank_delta: i64,
    pub is_new: bool,
}

impl ChangeRecord {
    /// Positive part of the XP delta; the amount credited to windows.
    pub fn gain(&self) -> u64 {
        if self.xp_delta > 0 {
            self.xp_delta as u64
        } else {
            0
        }
    }
}

/// The three accumulation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Daily,
    Weekly,
    Monthly,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Daily, Window::Weekly, Window::Monthly];
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Daily => write!(f, "daily"),
            Window::Weekly => write!(f, "weekly"),
            Window::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Window::Daily),
            "weekly" | "week" => Ok(Window::Weekly),
            "monthly" | "month" => Ok(Window::Monthly),
            other => Err(format!("unknown window: {}", other)),
        }
    }
}

/// Merged read-only view of one gang, used by reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GangView {
    pub name: String,
    pub xp: u64,
    pub rank: usize,
    pub level: i64,
    pub daily_xp: u64,
    pub weekly_xp: u64,
    pub monthly_xp: u64,
    pub slot1_completed: bool,
    pub slot2_completed: bool,
    pub slot1_xp: u64,
    pub slot2_xp: u64,
}

/// Totals for a closed day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub total_gangs: usize,
    pub active_gangs: usize,
    pub total_daily_xp: u64,
    pub total_weekly_xp: u64,
    pub slot1_completed: usize,
    pub slot2_completed: usize,
    pub both_completed: usize,
}

/// Snapshot of the daily window taken just before it resets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    /// Business day being closed.
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub summary: DailySummary,
    /// Top daily performers as (name, daily XP), best first.
    pub top_daily: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_gang_reads_rank_as_level() {
        let json = r#"{"gang_name": "Vipers", "xp": 1200, "rank": 4}"#;
        let gang: RawGang = serde_json::from_str(json).unwrap();
        assert_eq!(gang, RawGang::new("Vipers", 1200, 4));
    }

    #[test]
    fn test_raw_gang_requires_name_and_xp() {
        assert!(serde_json::from_str::<RawGang>(r#"{"xp": 10}"#).is_err());
        assert!(serde_json::from_str::<RawGang>(r#"{"gang_name": "A"}"#).is_err());
        assert!(serde_json::from_str::<RawGang>(r#"{"gang_name": "A", "xp": -5}"#).is_err());
    }

    #[test]
    fn test_window_from_str() {
        assert_eq!("daily".parse::<Window>(), Ok(Window::Daily));
        assert_eq!("WEEK".parse::<Window>(), Ok(Window::Weekly));
        assert_eq!(" monthly ".parse::<Window>(), Ok(Window::Monthly));
        assert!("yearly".parse::<Window>().is_err());
    }

    #[test]
    fn test_change_gain_ignores_losses() {
        let change = ChangeRecord {
            name: "A".to_string(),
            xp_before: 100,
            xp_after: 40,
            xp_delta: -60,
            level_before: 1,
            level_after: 1,
            level_delta: 0,
            rank_before: 1,
            rank_after: 2,
            rank_delta: 1,
            is_new: false,
        };
        assert_eq!(change.gain(), 0);
        assert_eq!(ChangeRecord { xp_delta: 25, ..change }.gain(), 25);
    }
}
