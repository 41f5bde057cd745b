//! Window reset clocks.
//!
//! Each window keeps the instant of its last reset. Boundaries are always
//! evaluated against that instant, never against tick counts, so checking
//! twice with the same `now` cannot reset twice.

use crate::error::{TrackerError, TrackerResult};
use crate::models::Window;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Compile-time `HH:MM`; an out-of-range literal fails the build.
pub const fn clock_time(hour: u32, minute: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, minute, 0) {
        Some(time) => time,
        None => panic!("clock time out of range"),
    }
}

/// Civil-time rules shared by all three clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    pub timezone: Tz,
    /// Local time at which a new day (and week, and month) begins.
    pub reset_time: NaiveTime,
    pub weekly_anchor: Weekday,
    pub monthly_anchor_day: u32,
}

impl Default for ResetSchedule {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Tehran,
            reset_time: clock_time(7, 0),
            weekly_anchor: Weekday::Sun,
            monthly_anchor_day: 1,
        }
    }
}

impl ResetSchedule {
    /// Civil date of `instant` in the schedule's timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }
}

/// Last-reset bookkeeping for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClock {
    pub window: Window,
    last_reset: Option<DateTime<Utc>>,
}

impl ResetClock {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            last_reset: None,
        }
    }

    pub fn last_reset(&self) -> Option<DateTime<Utc>> {
        self.last_reset
    }

    pub fn record_reset(&mut self, now: DateTime<Utc>) {
        self.last_reset = Some(now);
    }

    /// Whether `now` lies past this window's next boundary.
    ///
    /// An unset clock never resets. `now` earlier than the last reset is a
    /// [`TrackerError::ClockAnomaly`].
    pub fn should_reset(&self, schedule: &ResetSchedule, now: DateTime<Utc>) -> TrackerResult<bool> {
        let Some(last) = self.last_reset else {
            return Ok(false);
        };

        if now < last {
            return Err(TrackerError::ClockAnomaly(format!(
                "{} clock: now {} is earlier than last reset {}",
                self.window, now, last
            )));
        }

        let local_now = now.with_timezone(&schedule.timezone);
        let local_last = last.with_timezone(&schedule.timezone);
        let past_reset_time = local_now.time() >= schedule.reset_time;

        let due = match self.window {
            Window::Daily => {
                past_reset_time && local_now.date_naive() != local_last.date_naive()
            }
            Window::Weekly => {
                past_reset_time
                    && local_now.weekday() == schedule.weekly_anchor
                    && now - last >= Duration::days(7)
            }
            Window::Monthly => {
                past_reset_time
                    && local_now.day() == schedule.monthly_anchor_day
                    && (local_now.year(), local_now.month())
                        != (local_last.year(), local_last.month())
            }
        };

        Ok(due)
    }

    /// Evaluate the boundary once for this tick.
    ///
    /// The first observation only records the instant. Returns `true` when
    /// the owning window must be cleared; the reset is already recorded.
    pub fn evaluate(&mut self, schedule: &ResetSchedule, now: DateTime<Utc>) -> bool {
        if self.last_reset.is_none() {
            debug!("{} clock: first observation at {}, no reset", self.window, now);
            self.record_reset(now);
            return false;
        }

        match self.should_reset(schedule, now) {
            Ok(true) => {
                info!(
                    "{} reset triggered at local time {}",
                    self.window,
                    now.with_timezone(&schedule.timezone).format("%Y-%m-%d %H:%M:%S %Z")
                );
                self.record_reset(now);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Skipping {} reset check: {}", self.window, e);
                false
            }
        }
    }
}

/// The three clocks owned by the aggregation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClocks {
    pub daily: ResetClock,
    pub weekly: ResetClock,
    pub monthly: ResetClock,
}

impl Default for ResetClocks {
    fn default() -> Self {
        Self {
            daily: ResetClock::new(Window::Daily),
            weekly: ResetClock::new(Window::Weekly),
            monthly: ResetClock::new(Window::Monthly),
        }
    }
}

impl ResetClocks {
    pub fn get(&self, window: Window) -> &ResetClock {
        match window {
            Window::Daily => &self.daily,
            Window::Weekly => &self.weekly,
            Window::Monthly => &self.monthly,
        }
    }

    pub fn get_mut(&mut self, window: Window) -> &mut ResetClock {
        match window {
            Window::Daily => &mut self.daily,
            Window::Weekly => &mut self.weekly,
            Window::Monthly => &mut self.monthly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Tehran;

    fn tehran(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Tehran
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn clock_at(window: Window, last: DateTime<Utc>) -> ResetClock {
        let mut clock = ResetClock::new(window);
        clock.record_reset(last);
        clock
    }

    #[test]
    fn test_first_observation_never_resets() {
        let schedule = ResetSchedule::default();
        for window in Window::ALL {
            let mut clock = ResetClock::new(window);
            let now = tehran(2025, 6, 1, 7, 0);
            assert!(!clock.should_reset(&schedule, now).unwrap());
            assert!(!clock.evaluate(&schedule, now));
            assert_eq!(clock.last_reset(), Some(now));
        }
    }

    #[test]
    fn test_daily_resets_at_boundary() {
        let schedule = ResetSchedule::default();
        let clock = clock_at(Window::Daily, tehran(2025, 6, 1, 7, 0));

        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 1, 23, 59)).unwrap());
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 2, 6, 59)).unwrap());
        assert!(clock.should_reset(&schedule, tehran(2025, 6, 2, 7, 0)).unwrap());
        assert!(clock.should_reset(&schedule, tehran(2025, 6, 2, 15, 30)).unwrap());
    }

    #[test]
    fn test_daily_reset_is_idempotent() {
        let schedule = ResetSchedule::default();
        let mut clock = clock_at(Window::Daily, tehran(2025, 6, 1, 7, 0));
        let now = tehran(2025, 6, 2, 7, 0);

        assert!(clock.evaluate(&schedule, now));
        assert!(!clock.should_reset(&schedule, now).unwrap());
        assert!(!clock.evaluate(&schedule, now));
    }

    #[test]
    fn test_early_bootstrap_waits_for_next_date() {
        let schedule = ResetSchedule::default();
        let mut clock = ResetClock::new(Window::Daily);
        assert!(!clock.evaluate(&schedule, tehran(2025, 6, 1, 5, 0)));

        // Same local date as the bootstrap: 07:00 is not a boundary yet.
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 1, 7, 0)).unwrap());
        assert!(!clock.evaluate(&schedule, tehran(2025, 6, 1, 23, 59)));
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 2, 6, 59)).unwrap());
        assert!(clock.evaluate(&schedule, tehran(2025, 6, 2, 7, 0)));
    }

    #[test]
    fn test_daily_late_first_tick_after_missed_boundary() {
        let schedule = ResetSchedule::default();
        let clock = clock_at(Window::Daily, tehran(2025, 6, 1, 12, 0));

        // Process was idle across the 07:00 boundary.
        assert!(clock.should_reset(&schedule, tehran(2025, 6, 2, 9, 45)).unwrap());
    }

    #[test]
    fn test_weekly_reset_after_eight_days() {
        let schedule = ResetSchedule::default();
        // 2025-06-01 is a Sunday.
        let now = tehran(2025, 6, 1, 7, 0);
        let mut clock = clock_at(Window::Weekly, now - Duration::days(8));

        assert!(clock.should_reset(&schedule, now).unwrap());
        clock.record_reset(now);
        assert!(!clock.should_reset(&schedule, now).unwrap());
    }

    #[test]
    fn test_weekly_requires_anchor_day_and_time() {
        let schedule = ResetSchedule::default();
        let clock = clock_at(Window::Weekly, tehran(2025, 5, 20, 12, 0));

        // Sunday before 07:00.
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 1, 6, 59)).unwrap());
        // Monday.
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 2, 8, 0)).unwrap());
        // Sunday after 07:00.
        assert!(clock.should_reset(&schedule, tehran(2025, 6, 1, 9, 0)).unwrap());
    }

    #[test]
    fn test_weekly_requires_seven_days() {
        let schedule = ResetSchedule::default();
        let clock = clock_at(Window::Weekly, tehran(2025, 5, 28, 12, 0));

        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 1, 7, 0)).unwrap());
        assert!(clock.should_reset(&schedule, tehran(2025, 6, 8, 7, 0)).unwrap());
    }

    #[test]
    fn test_monthly_reset_on_first_day() {
        let schedule = ResetSchedule::default();
        let mut clock = clock_at(Window::Monthly, tehran(2025, 5, 14, 10, 0));

        assert!(!clock.should_reset(&schedule, tehran(2025, 5, 31, 23, 0)).unwrap());
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 1, 6, 59)).unwrap());
        assert!(clock.evaluate(&schedule, tehran(2025, 6, 1, 7, 0)));
        assert!(!clock.evaluate(&schedule, tehran(2025, 6, 1, 7, 0)));
        assert!(!clock.evaluate(&schedule, tehran(2025, 6, 1, 18, 0)));
        assert!(!clock.should_reset(&schedule, tehran(2025, 6, 2, 7, 0)).unwrap());
    }

    #[test]
    fn test_monthly_crosses_year() {
        let schedule = ResetSchedule::default();
        let clock = clock_at(Window::Monthly, tehran(2024, 12, 1, 7, 0));
        assert!(clock.should_reset(&schedule, tehran(2025, 1, 1, 7, 0)).unwrap());
    }

    #[test]
    fn test_clock_going_backwards_is_anomaly() {
        let schedule = ResetSchedule::default();
        let mut clock = clock_at(Window::Daily, tehran(2025, 6, 2, 7, 0));
        let earlier = tehran(2025, 6, 1, 8, 0);

        let err = clock.should_reset(&schedule, earlier).unwrap_err();
        assert!(matches!(err, TrackerError::ClockAnomaly(_)));

        assert!(!clock.evaluate(&schedule, earlier));
        assert_eq!(clock.last_reset(), Some(tehran(2025, 6, 2, 7, 0)));
    }

    #[test]
    fn test_daily_boundary_follows_dst() {
        let berlin = chrono_tz::Europe::Berlin;
        let schedule = ResetSchedule {
            timezone: berlin,
            ..ResetSchedule::default()
        };
        let local = |d: u32, h: u32, m: u32| {
            berlin
                .with_ymd_and_hms(2025, 3, d, h, m, 0)
                .single()
                .unwrap()
                .with_timezone(&Utc)
        };

        // Summer time starts on 2025-03-30; 07:00 local moves from 06:00Z to 05:00Z.
        let clock = clock_at(Window::Daily, local(29, 7, 0));
        assert!(!clock.should_reset(&schedule, local(30, 6, 59)).unwrap());
        assert!(clock.should_reset(&schedule, local(30, 7, 0)).unwrap());
    }

    #[test]
    fn test_local_date_uses_schedule_timezone() {
        let schedule = ResetSchedule::default();
        // 00:30 on the 2nd in Tehran is still the 1st in UTC.
        assert_eq!(
            schedule.local_date(tehran(2025, 6, 1, 23, 30)),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
        assert_eq!(
            schedule.local_date(tehran(2025, 6, 2, 0, 30)),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
        );
    }

    #[test]
    fn test_clock_time_const() {
        assert_eq!(clock_time(7, 0), NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(ResetSchedule::default().reset_time, clock_time(7, 0));
    }
}
