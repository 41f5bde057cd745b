//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Window;
use clap::Parser;
use std::path::PathBuf;

/// gangwatch - leaderboard XP tracker
///
/// Samples a gang leaderboard at a fixed interval and keeps daily, weekly
/// and monthly XP totals plus daily task completion, all in one civil
/// timezone.
///
/// Examples:
///   gangwatch
///   gangwatch --interval 60 --output board.md
///   gangwatch --sample fixtures/leaderboard.json --once
///   gangwatch --restore --reset weekly
///   gangwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .gangwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Leaderboard API URL
    ///
    /// Overrides the config file. Can also be set via GANGWATCH_URL.
    #[arg(short, long, value_name = "URL", env = "GANGWATCH_URL")]
    pub url: Option<String>,

    /// Read samples from a local JSON file instead of the API
    #[arg(long, value_name = "FILE", conflicts_with = "url")]
    pub sample: Option<PathBuf>,

    /// Seconds between ticks
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,

    /// Resume from the saved state instead of starting fresh
    #[arg(long)]
    pub restore: bool,

    /// State file path
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Force a window reset on the saved state and exit (daily, weekly, monthly)
    #[arg(long, value_name = "WINDOW")]
    pub reset: Option<Window>,

    /// Output file path for the leaderboard report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .gangwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Leaderboard URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(interval) = self.interval {
            if interval == 0 {
                return Err("Interval must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.reset.is_some() && self.once {
            return Err("Cannot use both --reset and --once".to_string());
        }

        if let Some(ref sample) = self.sample {
            if !sample.is_file() {
                return Err(format!("Sample file does not exist: {}", sample.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            config: None,
            url: None,
            sample: None,
            interval: None,
            once: false,
            restore: false,
            state_file: None,
            reset: None,
            output: None,
            format: OutputFormat::Markdown,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_default_args_are_valid() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.url = Some("ftp://example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut args = make_args();
        args.interval = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.reset = Some(Window::Daily);
        args.once = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_sample() {
        let mut args = make_args();
        args.sample = Some(PathBuf::from("/no/such/sample.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_reset_window() {
        let args = Args::try_parse_from(["gangwatch", "--reset", "weekly"]).unwrap();
        assert_eq!(args.reset, Some(Window::Weekly));

        assert!(Args::try_parse_from(["gangwatch", "--reset", "yearly"]).is_err());
    }
}
