//! Markdown and JSON leaderboard report generation.
//!
//! This module renders the merged gang views and their statistics into
//! the leaderboard report, and closed days into daily report files.

use crate::analysis::{
    leaderboard_stats, performance, task_progress, LeaderboardStats, Performance, TaskProgress,
};
use crate::error::TrackerResult;
use crate::models::{DailyReport, GangView};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything shown in one leaderboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardReport {
    pub generated_at: DateTime<Utc>,
    pub timezone: String,
    pub gangs: Vec<GangView>,
    pub stats: LeaderboardStats,
    pub tasks: TaskProgress,
    pub performance: Performance,
}

impl LeaderboardReport {
    /// Build a report from views in rank order.
    pub fn build(gangs: Vec<GangView>, generated_at: DateTime<Utc>, timezone: &str) -> Self {
        Self {
            generated_at,
            timezone: timezone.to_string(),
            stats: leaderboard_stats(&gangs),
            tasks: task_progress(&gangs),
            performance: performance(&gangs),
            gangs,
        }
    }
}

/// Format a number with thousands separators.
pub fn format_xp(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

fn medal(position: usize) -> &'static str {
    match position {
        0 => "🥇",
        1 => "🥈",
        2 => "🥉",
        _ => "🏅",
    }
}

fn check(done: bool) -> &'static str {
    if done {
        "✅"
    } else {
        "❌"
    }
}

/// Generate the complete Markdown leaderboard.
pub fn generate_markdown_report(report: &LeaderboardReport) -> String {
    let mut output = String::new();

    output.push_str("# Gang Leaderboard\n\n");
    output.push_str(&format!(
        "*Updated {} ({})*\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.timezone
    ));

    output.push_str(&generate_leaderboard_section(&report.gangs));
    output.push_str(&generate_stats_section(&report.stats));
    output.push_str(&generate_tasks_section(&report.tasks));
    output.push_str(&generate_performance_section(&report.performance));
    output.push_str(&generate_footer());

    output
}

/// Generate the leaderboard table.
fn generate_leaderboard_section(gangs: &[GangView]) -> String {
    let mut section = String::new();

    section.push_str("## Leaderboard\n\n");

    if gangs.is_empty() {
        section.push_str("No leaderboard data yet.\n\n");
        return section;
    }

    section.push_str("| | Gang | Total XP | Daily XP | Weekly XP | Monthly XP | Tasks | Rank | Level |\n");
    section.push_str("|:---:|:---|---:|---:|---:|---:|:---:|:---:|:---:|\n");

    for (i, gang) in gangs.iter().enumerate() {
        section.push_str(&format!(
            "| {} | **{}** | {} | {} | {} | {} | {} {} | #{} | {} |\n",
            medal(i),
            gang.name,
            format_xp(gang.xp),
            format_xp(gang.daily_xp),
            format_xp(gang.weekly_xp),
            format_xp(gang.monthly_xp),
            check(gang.slot1_completed),
            check(gang.slot2_completed),
            gang.rank,
            gang.level
        ));
    }
    section.push('\n');

    section
}

/// Generate the live statistics section.
fn generate_stats_section(stats: &LeaderboardStats) -> String {
    let mut section = String::new();

    section.push_str("## Live Statistics\n\n");
    section.push_str(&format!("- **Total Gangs:** {}\n", stats.total_gangs));
    section.push_str(&format!("- **Total XP:** {}\n", format_xp(stats.total_xp)));
    section.push_str(&format!("- **Average XP:** {}\n", format_xp(stats.average_xp)));
    section.push_str(&format!("- **Active Today:** {}\n", stats.active_today));
    if let Some(ref top) = stats.top_gang {
        section.push_str(&format!("- **Top Gang:** {}\n", top));
    }
    section.push('\n');

    section
}

/// Generate the task progress section.
fn generate_tasks_section(tasks: &TaskProgress) -> String {
    let mut section = String::new();

    section.push_str("## Task Progress\n\n");
    section.push_str(&format!("- **Task 1:** {}/{}\n", tasks.slot1, tasks.total));
    section.push_str(&format!("- **Task 2:** {}/{}\n", tasks.slot2, tasks.total));
    section.push_str(&format!("- **Both Tasks:** {}/{}\n", tasks.both, tasks.total));
    section.push_str(&format!("- **Completion Rate:** {}%\n\n", tasks.completion_rate));

    section
}

/// Generate the performance section.
fn generate_performance_section(perf: &Performance) -> String {
    let mut section = String::new();

    section.push_str("## Performance\n\n");

    let leaders = [
        ("Top Daily", &perf.top_daily),
        ("Top Weekly", &perf.top_weekly),
        ("Top Monthly", &perf.top_monthly),
    ];
    for (label, leader) in leaders {
        if let Some((name, xp)) = leader {
            section.push_str(&format!("- **{}:** {} ({})\n", label, name, format_xp(*xp)));
        }
    }

    section.push_str(&format!("- **Avg Daily:** {}\n", format_xp(perf.avg_daily)));
    section.push_str(&format!("- **Avg Weekly:** {}\n", format_xp(perf.avg_weekly)));
    section.push_str(&format!("- **Avg Monthly:** {}\n\n", format_xp(perf.avg_monthly)));

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by gangwatch v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON leaderboard report.
pub fn generate_json_report(report: &LeaderboardReport) -> TrackerResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render a closed day as Markdown.
pub fn generate_daily_report(report: &DailyReport) -> String {
    let mut output = String::new();
    let summary = &report.summary;

    output.push_str(&format!("# Daily Gang Report: {}\n\n", report.date));
    output.push_str(&format!(
        "*Generated {}*\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str("## Summary\n\n");
    output.push_str(&format!("- **Total Gangs:** {}\n", summary.total_gangs));
    output.push_str(&format!("- **Active Gangs:** {}\n", summary.active_gangs));
    output.push_str(&format!("- **Total Daily XP:** {}\n", format_xp(summary.total_daily_xp)));
    output.push_str(&format!("- **Total Weekly XP:** {}\n\n", format_xp(summary.total_weekly_xp)));

    output.push_str("## Task Progress\n\n");
    output.push_str(&format!("- **Task 1:** {}/{}\n", summary.slot1_completed, summary.total_gangs));
    output.push_str(&format!("- **Task 2:** {}/{}\n", summary.slot2_completed, summary.total_gangs));
    output.push_str(&format!("- **Both Tasks:** {}/{}\n\n", summary.both_completed, summary.total_gangs));

    if !report.top_daily.is_empty() {
        output.push_str("## Top Daily Performers\n\n");
        for (i, (name, xp)) in report.top_daily.iter().enumerate() {
            output.push_str(&format!("{} **{}**: {} XP\n", medal(i), name, format_xp(*xp)));
        }
        output.push('\n');
    }

    output
}

/// File name for a daily report.
pub fn daily_report_file_name(report: &DailyReport) -> String {
    format!("daily-report-{}.md", report.date)
}

/// Write rendered content, creating parent directories as needed.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
