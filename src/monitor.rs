//! Fixed-cadence driver around the aggregation engine.
//!
//! Each tick fetches a sample, applies it to the engine, then writes the
//! leaderboard report, any daily report the tick produced, and the state
//! file. Ticks never overlap: one requested while another is in flight is
//! dropped.

use crate::analysis::gain_alerts;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::models::{ChangeRecord, DailyReport, GangView};
use crate::report::{
    daily_report_file_name, generate_daily_report, generate_json_report,
    generate_markdown_report, write_report, LeaderboardReport,
};
use crate::source::SampleSource;
use crate::store::StateStore;
use crate::tracker::{AggregationEngine, AggregationState};
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Where and how the monitor writes its output.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub output: PathBuf,
    pub format: OutputFormat,
    pub daily_dir: PathBuf,
    pub alert_threshold: u64,
}

impl MonitorOptions {
    pub fn from_config(config: &Config, format: OutputFormat) -> Self {
        Self {
            output: PathBuf::from(&config.report.output),
            format,
            daily_dir: PathBuf::from(&config.report.daily_dir),
            alert_threshold: config.source.alert_threshold,
        }
    }
}

/// What happened to a requested tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The sample was applied.
    Applied { changes: usize },
    /// Another tick was still running.
    Skipped,
    /// Fetch or validation failed; state is unchanged.
    Failed,
}

/// Clears the in-flight flag when the tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Output of one applied tick, collected under the engine lock.
struct Applied {
    changes: Vec<ChangeRecord>,
    baseline: bool,
    views: Vec<GangView>,
    daily_report: Option<DailyReport>,
    state: AggregationState,
    timezone: &'static str,
}

/// Report and state files written after a tick, on the blocking pool.
struct Outputs {
    options: MonitorOptions,
    store: Option<StateStore>,
}

impl Outputs {
    fn publish(&self, applied: &Applied) {
        if applied.baseline || !applied.changes.is_empty() {
            if let Err(e) = self.write_leaderboard(applied) {
                error!("Failed to write leaderboard report: {:#}", e);
            }
        }

        if let Some(ref report) = applied.daily_report {
            let path = self.options.daily_dir.join(daily_report_file_name(report));
            match write_report(&generate_daily_report(report), &path) {
                Ok(()) => info!("Daily report saved to {}", path.display()),
                Err(e) => error!("Failed to write daily report: {:#}", e),
            }
        }

        if let Some(ref store) = self.store {
            if let Err(e) = store.save(&applied.state) {
                error!("Failed to save state: {:#}", e);
            }
        }
    }

    fn write_leaderboard(&self, applied: &Applied) -> Result<()> {
        let report = LeaderboardReport::build(applied.views.clone(), Utc::now(), applied.timezone);
        let content = match self.options.format {
            OutputFormat::Json => generate_json_report(&report)?,
            OutputFormat::Markdown => generate_markdown_report(&report),
        };
        write_report(&content, &self.options.output)?;
        debug!("Leaderboard report written to {}", self.options.output.display());
        Ok(())
    }
}

pub struct Monitor {
    source: SampleSource,
    engine: Mutex<AggregationEngine>,
    outputs: Arc<Outputs>,
    in_flight: AtomicBool,
}

impl Monitor {
    pub fn new(
        source: SampleSource,
        engine: AggregationEngine,
        store: Option<StateStore>,
        options: MonitorOptions,
    ) -> Self {
        Self {
            source,
            engine: Mutex::new(engine),
            outputs: Arc::new(Outputs { options, store }),
            in_flight: AtomicBool::new(false),
        }
    }

    fn engine(&self) -> MutexGuard<'_, AggregationEngine> {
        self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current merged views.
    pub fn views(&self) -> Vec<GangView> {
        self.engine().views()
    }

    /// Run one tick unless another is already in flight.
    pub async fn try_tick(&self) -> TickOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("Previous tick still running, skipping");
            return TickOutcome::Skipped;
        };

        let sample = match self.source.fetch().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Fetch from {} failed, keeping previous state: {}", self.source.describe(), e);
                return TickOutcome::Failed;
            }
        };

        let applied = {
            let mut engine = self.engine();
            let baseline = engine.gangs().is_empty();
            let changes = match engine.tick(sample) {
                Ok(changes) => changes,
                Err(e) => {
                    warn!("Sample rejected, keeping previous state: {}", e);
                    return TickOutcome::Failed;
                }
            };
            Applied {
                baseline,
                views: engine.views(),
                daily_report: engine.take_daily_report(),
                state: engine.state().clone(),
                timezone: engine.settings().schedule.timezone.name(),
                changes,
            }
        };

        self.log_changes(&applied.changes);

        let changes = applied.changes.len();
        let outputs = Arc::clone(&self.outputs);
        if let Err(e) = tokio::task::spawn_blocking(move || outputs.publish(&applied)).await {
            error!("Writing tick output failed: {}", e);
        }

        TickOutcome::Applied { changes }
    }

    fn log_changes(&self, changes: &[ChangeRecord]) {
        for change in changes {
            debug!(
                "{}: {} -> {} XP ({:+}), rank {} -> {}",
                change.name,
                change.xp_before,
                change.xp_after,
                change.xp_delta,
                change.rank_before,
                change.rank_after
            );
        }
        for alert in gain_alerts(changes, self.outputs.options.alert_threshold) {
            info!(
                "XP gain alert: {} gained {} XP (now {})",
                alert.name, alert.xp_delta, alert.xp_after
            );
        }
    }

    /// Tick every `every` until Ctrl-C.
    pub async fn run(&self, every: Duration) -> Result<()> {
        info!(
            "Monitoring {} every {}s",
            self.source.describe(),
            every.as_secs()
        );

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.try_tick().await;
                }
                result = &mut shutdown => {
                    result?;
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileSource;
    use crate::tracker::TrackerSettings;
    use std::path::Path;

    fn write_sample(path: &Path, gangs: &[(&str, u64)]) {
        let tops: Vec<String> = gangs
            .iter()
            .map(|(name, xp)| format!(r#"{{"gang_name": "{}", "xp": {}, "rank": 1}}"#, name, xp))
            .collect();
        std::fs::write(path, format!(r#"{{"tops": [{}]}}"#, tops.join(","))).unwrap();
    }

    fn monitor_in(dir: &Path, format: OutputFormat) -> Monitor {
        let options = MonitorOptions {
            output: dir.join("board.md"),
            format,
            daily_dir: dir.join("reports"),
            alert_threshold: 500,
        };
        Monitor::new(
            SampleSource::File(FileSource::new(dir.join("sample.json"))),
            AggregationEngine::new(TrackerSettings::default()),
            Some(StateStore::new(dir.join("state.json"))),
            options,
        )
    }

    #[tokio::test]
    async fn test_ticks_apply_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_in(dir.path(), OutputFormat::Markdown);

        write_sample(&dir.path().join("sample.json"), &[("Wolves", 1000), ("Ravens", 200)]);
        assert_eq!(monitor.try_tick().await, TickOutcome::Applied { changes: 0 });
        let board = std::fs::read_to_string(dir.path().join("board.md")).unwrap();
        assert!(board.contains("Wolves"));

        write_sample(&dir.path().join("sample.json"), &[("Wolves", 1300), ("Ravens", 200)]);
        assert_eq!(monitor.try_tick().await, TickOutcome::Applied { changes: 1 });

        let views = monitor.views();
        assert_eq!(views[0].name, "Wolves");
        assert_eq!(views[0].weekly_xp, 300);

        let saved = StateStore::new(dir.path().join("state.json")).load().unwrap().unwrap();
        assert_eq!(saved.weekly.accumulated("Wolves"), 300);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_outputs_written_before_tick_returns() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_in(dir.path(), OutputFormat::Markdown);
        write_sample(&dir.path().join("sample.json"), &[("Wolves", 1000)]);

        assert_eq!(monitor.try_tick().await, TickOutcome::Applied { changes: 0 });

        assert!(dir.path().join("board.md").is_file());
        assert!(dir.path().join("state.json").is_file());
        assert!(!monitor.in_flight.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_in(dir.path(), OutputFormat::Markdown);

        write_sample(&dir.path().join("sample.json"), &[("Wolves", 1000)]);
        monitor.try_tick().await;

        std::fs::write(dir.path().join("sample.json"), r#"{"tops": []}"#).unwrap();
        assert_eq!(monitor.try_tick().await, TickOutcome::Failed);

        std::fs::remove_file(dir.path().join("sample.json")).unwrap();
        assert_eq!(monitor.try_tick().await, TickOutcome::Failed);

        assert_eq!(monitor.views().len(), 1);
        assert_eq!(monitor.views()[0].xp, 1000);
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_in(dir.path(), OutputFormat::Markdown);
        write_sample(&dir.path().join("sample.json"), &[("Wolves", 1000)]);

        monitor.in_flight.store(true, Ordering::Release);
        assert_eq!(monitor.try_tick().await, TickOutcome::Skipped);
        assert!(monitor.views().is_empty());

        monitor.in_flight.store(false, Ordering::Release);
        assert_eq!(monitor.try_tick().await, TickOutcome::Applied { changes: 0 });
        assert!(!monitor.in_flight.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_json_report_format() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor_in(dir.path(), OutputFormat::Json);
        write_sample(&dir.path().join("sample.json"), &[("Wolves", 1000)]);

        monitor.try_tick().await;

        let board = std::fs::read_to_string(dir.path().join("board.md")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&board).unwrap();
        assert_eq!(parsed["gangs"][0]["name"], "Wolves");
        assert_eq!(parsed["timezone"], "Asia/Tehran");
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::default();
        let options = MonitorOptions::from_config(&config, OutputFormat::Markdown);
        assert_eq!(options.output, PathBuf::from("gangwatch_report.md"));
        assert_eq!(options.daily_dir, PathBuf::from("data/reports"));
        assert_eq!(options.alert_threshold, 500);
    }
}
