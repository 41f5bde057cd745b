//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.gangwatch.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".gangwatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Leaderboard source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Window reset schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Daily task settings.
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Resume from the state file on startup instead of starting fresh.
    #[serde(default)]
    pub restore_on_startup: bool,

    /// Where tracker state is saved after every tick. Empty disables saving.
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            restore_on_startup: false,
            state_file: default_state_file(),
        }
    }
}

fn default_state_file() -> String {
    "data/state.json".to_string()
}

/// Leaderboard source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Leaderboard API URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Seconds between ticks.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Extra attempts when the site answers with an HTML page.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Delay between those attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Log an alert when a gang gains at least this much XP in one tick.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            interval_seconds: default_interval(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            alert_threshold: default_alert_threshold(),
        }
    }
}

fn default_url() -> String {
    "https://app.diamondrp.ir/api/tops/gangs".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}

fn default_interval() -> u64 {
    30
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay() -> u64 {
    1500
}

fn default_alert_threshold() -> u64 {
    500
}

/// Civil-time schedule for window resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone all windows are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local time (HH:MM) at which days, weeks and months roll over.
    #[serde(default = "default_daily_reset")]
    pub daily_reset: String,

    /// Weekday the weekly window resets on.
    #[serde(default = "default_weekly_anchor")]
    pub weekly_anchor: String,

    /// Day of month the monthly window resets on (1-28).
    #[serde(default = "default_monthly_anchor_day")]
    pub monthly_anchor_day: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            daily_reset: default_daily_reset(),
            weekly_anchor: default_weekly_anchor(),
            monthly_anchor_day: default_monthly_anchor_day(),
        }
    }
}

fn default_timezone() -> String {
    "Asia/Tehran".to_string()
}

fn default_daily_reset() -> String {
    "07:00".to_string()
}

fn default_weekly_anchor() -> String {
    "sunday".to_string()
}

fn default_monthly_anchor_day() -> u32 {
    1
}

/// Daily task detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// A single-tick gain of exactly this much completes a task.
    #[serde(default = "default_xp_threshold")]
    pub xp_threshold: u64,

    /// Start of the day slot (HH:MM, inclusive).
    #[serde(default = "default_day_slot_start")]
    pub day_slot_start: String,

    /// End of the day slot (HH:MM, exclusive). Everything else is night.
    #[serde(default = "default_day_slot_end")]
    pub day_slot_end: String,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            xp_threshold: default_xp_threshold(),
            day_slot_start: default_day_slot_start(),
            day_slot_end: default_day_slot_end(),
        }
    }
}

fn default_xp_threshold() -> u64 {
    500
}

fn default_day_slot_start() -> String {
    "07:00".to_string()
}

fn default_day_slot_end() -> String {
    "18:00".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Leaderboard report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Directory for daily report files.
    #[serde(default = "default_daily_dir")]
    pub daily_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            daily_dir: default_daily_dir(),
        }
    }
}

fn default_output() -> String {
    "gangwatch_report.md".to_string()
}

fn default_daily_dir() -> String {
    "data/reports".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.url {
            self.source.url = url.clone();
        }
        if let Some(interval) = args.interval {
            self.source.interval_seconds = interval;
        }
        if let Some(ref output) = args.output {
            self.report.output = output.display().to_string();
        }
        if let Some(ref state_file) = args.state_file {
            self.general.state_file = state_file.display().to_string();
        }

        // Flags only ever switch restore on
        if args.restore {
            self.general.restore_on_startup = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
