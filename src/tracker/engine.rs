//! Aggregation engine: ingest, diff, reset, accumulate.
//!
//! The engine exclusively owns an [`AggregationState`]. Every tick runs
//! synchronously from validation to task detection; nothing here awaits, so
//! a tick is never observed half-applied.

use crate::analysis::{daily_summary, top_by};
use crate::config::Config;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{ChangeRecord, DailyReport, GangSnapshot, GangView, RawGang, Window};
use crate::tracker::clock::{clock_time, ResetClocks, ResetSchedule};
use crate::tracker::diff::{diff, rank_sample};
use crate::tracker::windows::{DailyWindow, TaskSlot, TotalsWindow};
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Largest XP a sample may carry; deltas must stay representable as `i64`.
const MAX_XP: u64 = i64::MAX as u64;

/// Number of top daily performers kept in a daily report.
const DAILY_REPORT_TOP: usize = 3;

/// Tracker rules, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub schedule: ResetSchedule,
    /// A gain must equal this exactly to complete a task.
    pub task_threshold: u64,
    pub day_slot_start: NaiveTime,
    pub day_slot_end: NaiveTime,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            schedule: ResetSchedule::default(),
            task_threshold: 500,
            day_slot_start: clock_time(7, 0),
            day_slot_end: clock_time(18, 0),
        }
    }
}

impl TrackerSettings {
    /// Task slot for a gain observed at `now`.
    pub fn slot_at(&self, now: DateTime<Utc>) -> TaskSlot {
        let local = now.with_timezone(&self.schedule.timezone).time();
        if local >= self.day_slot_start && local < self.day_slot_end {
            TaskSlot::First
        } else {
            TaskSlot::Second
        }
    }
}

impl TryFrom<&Config> for TrackerSettings {
    type Error = TrackerError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let timezone = config
            .schedule
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| {
                TrackerError::InvalidSetting(format!(
                    "timezone '{}': {}",
                    config.schedule.timezone, e
                ))
            })?;

        let monthly_anchor_day = config.schedule.monthly_anchor_day;
        if !(1..=28).contains(&monthly_anchor_day) {
            return Err(TrackerError::InvalidSetting(format!(
                "monthly_anchor_day must be between 1 and 28, got {}",
                monthly_anchor_day
            )));
        }

        let day_slot_start = parse_clock_time("tasks.day_slot_start", &config.tasks.day_slot_start)?;
        let day_slot_end = parse_clock_time("tasks.day_slot_end", &config.tasks.day_slot_end)?;
        if day_slot_start >= day_slot_end {
            return Err(TrackerError::InvalidSetting(format!(
                "day slot must start before it ends ({} >= {})",
                day_slot_start, day_slot_end
            )));
        }

        if config.tasks.xp_threshold == 0 {
            return Err(TrackerError::InvalidSetting(
                "tasks.xp_threshold must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            schedule: ResetSchedule {
                timezone,
                reset_time: parse_clock_time("schedule.daily_reset", &config.schedule.daily_reset)?,
                weekly_anchor: parse_weekday(&config.schedule.weekly_anchor)?,
                monthly_anchor_day,
            },
            task_threshold: config.tasks.xp_threshold,
            day_slot_start,
            day_slot_end,
        })
    }
}

fn parse_clock_time(key: &str, value: &str) -> TrackerResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| TrackerError::InvalidSetting(format!("{} '{}': {}", key, value, e)))
}

fn parse_weekday(value: &str) -> TrackerResult<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| TrackerError::InvalidSetting(format!("weekly_anchor '{}' is not a weekday", value)))
}

/// Everything the tracker remembers between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationState {
    /// Ranked snapshot from the last successful tick.
    pub gangs: Vec<GangSnapshot>,
    pub daily: DailyWindow,
    pub weekly: TotalsWindow,
    pub monthly: TotalsWindow,
    pub clocks: ResetClocks,
    pub last_daily_report: Option<DailyReport>,
}

/// Orchestrates one tick at a time over an owned [`AggregationState`].
#[derive(Debug)]
pub struct AggregationEngine {
    settings: TrackerSettings,
    state: AggregationState,
    report_pending: bool,
}

impl AggregationEngine {
    /// Create an engine with empty accumulators and unset clocks.
    pub fn new(settings: TrackerSettings) -> Self {
        Self::with_state(settings, AggregationState::default())
    }

    /// Create an engine resuming from a previously saved state.
    pub fn with_state(settings: TrackerSettings, state: AggregationState) -> Self {
        Self {
            settings,
            state,
            report_pending: false,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn state(&self) -> &AggregationState {
        &self.state
    }

    pub fn gangs(&self) -> &[GangSnapshot] {
        &self.state.gangs
    }

    pub fn last_daily_report(&self) -> Option<&DailyReport> {
        self.state.last_daily_report.as_ref()
    }

    /// Hand out the daily report captured by the most recent daily reset,
    /// once.
    pub fn take_daily_report(&mut self) -> Option<DailyReport> {
        if !self.report_pending {
            return None;
        }
        self.report_pending = false;
        self.state.last_daily_report.clone()
    }

    /// Run one tick against the wall clock.
    pub fn tick(&mut self, sample: Vec<RawGang>) -> TrackerResult<Vec<ChangeRecord>> {
        self.tick_at(sample, Utc::now())
    }

    /// Run one tick at `now`.
    ///
    /// A rejected sample leaves the state untouched.
    pub fn tick_at(
        &mut self,
        sample: Vec<RawGang>,
        now: DateTime<Utc>,
    ) -> TrackerResult<Vec<ChangeRecord>> {
        validate_sample(&sample)?;

        let ranked = rank_sample(sample);
        let changes = diff(&ranked, &self.state.gangs);
        let first_observation = self.state.gangs.is_empty();
        self.state.gangs = ranked;

        for gang in &self.state.gangs {
            self.state.daily.track(&gang.name);
        }
        if first_observation {
            info!(
                "Baseline of {} gangs recorded, no changes reported",
                self.state.gangs.len()
            );
        }

        self.evaluate_resets(now);

        self.state.daily.apply(&changes);
        self.state.weekly.apply(&changes);
        self.state.monthly.apply(&changes);

        self.detect_tasks(&changes, now);

        if changes.is_empty() {
            debug!("Tick complete, no changes");
        } else {
            info!("Tick complete, {} changes detected", changes.len());
        }

        Ok(changes)
    }

    /// Clear `window` unconditionally and record `now` as its reset.
    pub fn force_reset(&mut self, window: Window, now: DateTime<Utc>) {
        info!("Forcing {} reset", window);
        self.clear_window(window, now);
        self.state.clocks.get_mut(window).record_reset(now);
    }

    /// Merged per-gang view in rank order.
    pub fn views(&self) -> Vec<GangView> {
        self.state
            .gangs
            .iter()
            .map(|gang| {
                let daily = self.state.daily.get(&gang.name).cloned().unwrap_or_default();
                GangView {
                    name: gang.name.clone(),
                    xp: gang.xp,
                    rank: gang.rank,
                    level: gang.level,
                    daily_xp: daily.accumulated,
                    weekly_xp: self.state.weekly.accumulated(&gang.name),
                    monthly_xp: self.state.monthly.accumulated(&gang.name),
                    slot1_completed: daily.slot1_completed,
                    slot2_completed: daily.slot2_completed,
                    slot1_xp: daily.slot1_xp,
                    slot2_xp: daily.slot2_xp,
                }
            })
            .collect()
    }

    fn evaluate_resets(&mut self, now: DateTime<Utc>) {
        for window in Window::ALL {
            let closing = self.state.clocks.get(window).last_reset();
            if self.state.clocks.get_mut(window).evaluate(&self.settings.schedule, now) {
                if window == Window::Daily {
                    self.capture_daily_report(closing.unwrap_or(now), now);
                }
                self.clear(window);
            }
        }
    }

    fn clear_window(&mut self, window: Window, now: DateTime<Utc>) {
        if window == Window::Daily {
            let opened = self.state.clocks.daily.last_reset().unwrap_or(now);
            self.capture_daily_report(opened, now);
        }
        self.clear(window);
    }

    fn clear(&mut self, window: Window) {
        let entries = match window {
            Window::Daily => {
                let n = self.state.daily.len();
                self.state.daily.clear();
                n
            }
            Window::Weekly => {
                let n = self.state.weekly.len();
                self.state.weekly.clear();
                n
            }
            Window::Monthly => {
                let n = self.state.monthly.len();
                self.state.monthly.clear();
                n
            }
        };
        info!("{} XP reset completed ({} entries)", window, entries);
    }

    fn capture_daily_report(&mut self, opened: DateTime<Utc>, now: DateTime<Utc>) {
        let views = self.views();
        let report = DailyReport {
            date: self.settings.schedule.local_date(opened),
            generated_at: now,
            summary: daily_summary(&views),
            top_daily: top_by(&views, |v| v.daily_xp, DAILY_REPORT_TOP)
                .into_iter()
                .map(|v| (v.name.clone(), v.daily_xp))
                .collect(),
        };
        info!(
            "Daily report for {}: {} active gangs, {} XP",
            report.date, report.summary.active_gangs, report.summary.total_daily_xp
        );
        self.state.last_daily_report = Some(report);
        self.report_pending = true;
    }

    fn detect_tasks(&mut self, changes: &[ChangeRecord], now: DateTime<Utc>) {
        let slot = self.settings.slot_at(now);
        let threshold = self.settings.task_threshold;

        for change in changes {
            let gain = change.gain();
            if gain == 0 {
                continue;
            }
            let Some(entry) = self.state.daily.get_mut(&change.name) else {
                continue;
            };
            if entry.complete_task(slot, gain, threshold) {
                info!(
                    "Task {} completed for {} at {}",
                    match slot {
                        TaskSlot::First => 1,
                        TaskSlot::Second => 2,
                    },
                    change.name,
                    now.with_timezone(&self.settings.schedule.timezone)
                        .format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
}

fn validate_sample(sample: &[RawGang]) -> TrackerResult<()> {
    if sample.is_empty() {
        return Err(TrackerError::MalformedSample(
            "sample contains no gangs".to_string(),
        ));
    }
    if let Some(pos) = sample.iter().position(|g| g.gang_name.trim().is_empty()) {
        return Err(TrackerError::MalformedSample(format!(
            "gang at position {} has no name",
            pos
        )));
    }
    if let Some(gang) = sample.iter().find(|g| g.xp > MAX_XP) {
        return Err(TrackerError::MalformedSample(format!(
            "gang '{}' reports out-of-range XP {}",
            gang.gang_name, gang.xp
        )));
    }
    Ok(())
}
