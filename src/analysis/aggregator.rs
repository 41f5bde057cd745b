//! Leaderboard aggregation and statistics.
//!
//! This module computes the summary figures shown alongside the
//! leaderboard: totals, averages, task progress and top performers.

use crate::models::{ChangeRecord, DailySummary, GangView};
use serde::{Deserialize, Serialize};

/// Headline figures for the whole leaderboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub total_gangs: usize,
    pub total_xp: u64,
    pub average_xp: u64,
    /// Gangs with any XP gained today.
    pub active_today: usize,
    pub top_gang: Option<String>,
}

/// Task completion counts across all gangs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub total: usize,
    pub slot1: usize,
    pub slot2: usize,
    pub both: usize,
    /// Percentage of gangs with both tasks done, rounded.
    pub completion_rate: u64,
}

/// Best gang and average per window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    pub top_daily: Option<(String, u64)>,
    pub top_weekly: Option<(String, u64)>,
    pub top_monthly: Option<(String, u64)>,
    pub avg_daily: u64,
    pub avg_weekly: u64,
    pub avg_monthly: u64,
}

/// Integer average rounded half up; zero for an empty set.
fn rounded_average(sum: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    let count = count as u64;
    (sum + count / 2) / count
}

/// Compute leaderboard headline statistics.
pub fn leaderboard_stats(views: &[GangView]) -> LeaderboardStats {
    let total_xp: u64 = views.iter().map(|v| v.xp).sum();

    LeaderboardStats {
        total_gangs: views.len(),
        total_xp,
        average_xp: rounded_average(total_xp, views.len()),
        active_today: views.iter().filter(|v| v.daily_xp > 0).count(),
        top_gang: top_by(views, |v| v.xp, 1).first().map(|v| v.name.clone()),
    }
}

/// Count completed task slots.
pub fn task_progress(views: &[GangView]) -> TaskProgress {
    let slot1 = views.iter().filter(|v| v.slot1_completed).count();
    let slot2 = views.iter().filter(|v| v.slot2_completed).count();
    let both = views
        .iter()
        .filter(|v| v.slot1_completed && v.slot2_completed)
        .count();

    TaskProgress {
        total: views.len(),
        slot1,
        slot2,
        both,
        completion_rate: rounded_average(both as u64 * 100, views.len()),
    }
}

/// Top gang and average for each window.
pub fn performance(views: &[GangView]) -> Performance {
    let best = |key: fn(&GangView) -> u64| {
        top_by(views, key, 1)
            .first()
            .map(|v| (v.name.clone(), key(v)))
    };
    let average = |key: fn(&GangView) -> u64| {
        rounded_average(views.iter().map(key).sum(), views.len())
    };

    Performance {
        top_daily: best(|v| v.daily_xp),
        top_weekly: best(|v| v.weekly_xp),
        top_monthly: best(|v| v.monthly_xp),
        avg_daily: average(|v| v.daily_xp),
        avg_weekly: average(|v| v.weekly_xp),
        avg_monthly: average(|v| v.monthly_xp),
    }
}

/// Summarise the daily window, as recorded in a daily report.
pub fn daily_summary(views: &[GangView]) -> DailySummary {
    let progress = task_progress(views);

    DailySummary {
        total_gangs: views.len(),
        active_gangs: views.iter().filter(|v| v.daily_xp > 0).count(),
        total_daily_xp: views.iter().map(|v| v.daily_xp).sum(),
        total_weekly_xp: views.iter().map(|v| v.weekly_xp).sum(),
        slot1_completed: progress.slot1,
        slot2_completed: progress.slot2,
        both_completed: progress.both,
    }
}

/// The `n` gangs with the highest `key`, best first.
///
/// Ties keep the input (rank) order.
pub fn top_by<F>(views: &[GangView], key: F, n: usize) -> Vec<&GangView>
where
    F: Fn(&GangView) -> u64,
{
    let mut sorted: Vec<&GangView> = views.iter().collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(key(v)));
    sorted.truncate(n);
    sorted
}

/// Changes whose gain reaches the alert threshold.
pub fn gain_alerts(changes: &[ChangeRecord], threshold: u64) -> Vec<&ChangeRecord> {
    changes
        .iter()
        .filter(|c| c.gain() > 0 && c.gain() >= threshold)
        .collect()
}
