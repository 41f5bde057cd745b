//! Gangwatch - gang leaderboard XP tracker
//!
//! Samples a ranked leaderboard on a fixed interval, diffs consecutive
//! samples, and keeps daily, weekly and monthly XP windows plus daily task
//! completion in one civil timezone.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, state file, failed single tick, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod monitor;
mod report;
mod source;
mod store;
mod tracker;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use models::Window;
use monitor::{Monitor, MonitorOptions, TickOutcome};
use source::{FileSource, HttpSource, SampleSource};
use std::path::Path;
use std::time::Duration;
use store::StateStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tracker::{AggregationEngine, TrackerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Gangwatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Gangwatch failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .gangwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the leaderboard URL, timezone, reset schedule and task threshold.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    // RUST_LOG directives refine the flag-derived level.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let settings = TrackerSettings::try_from(&config).context("Invalid configuration")?;
    debug!("Tracker settings: {:?}", settings);

    let store = StateStore::from_config(&config.general.state_file);

    if let Some(window) = args.reset {
        return handle_reset(settings, store.as_ref(), &config, window);
    }

    let engine = restore_engine(settings, store.as_ref(), config.general.restore_on_startup)?;

    let source = match args.sample {
        Some(ref path) => SampleSource::File(FileSource::new(path.clone())),
        None => SampleSource::Http(HttpSource::new(&config.source)?),
    };

    let monitor = Monitor::new(
        source,
        engine,
        store,
        MonitorOptions::from_config(&config, args.format),
    );

    if args.once {
        return match monitor.try_tick().await {
            TickOutcome::Applied { changes } => {
                println!(
                    "✅ Tick applied: {} changes. Report saved to {}",
                    changes, config.report.output
                );
                Ok(())
            }
            TickOutcome::Skipped | TickOutcome::Failed => bail!("Tick did not complete"),
        };
    }

    monitor
        .run(Duration::from_secs(config.source.interval_seconds))
        .await
}

/// Build the engine, resuming from the state file when asked to.
fn restore_engine(
    settings: TrackerSettings,
    store: Option<&StateStore>,
    restore: bool,
) -> Result<AggregationEngine> {
    if !restore {
        info!("Starting with fresh state");
        return Ok(AggregationEngine::new(settings));
    }

    let Some(store) = store else {
        warn!("Restore requested but no state file is configured, starting fresh");
        return Ok(AggregationEngine::new(settings));
    };

    match store.load()? {
        Some(state) => {
            let engine = AggregationEngine::with_state(settings, state);
            if let Some(report) = engine.last_daily_report() {
                debug!("Last daily report covers {}", report.date);
            }
            Ok(engine)
        }
        None => {
            info!("No saved state at {}, starting fresh", store.path().display());
            Ok(AggregationEngine::new(settings))
        }
    }
}

/// Handle --reset: clear one window of the saved state and exit.
fn handle_reset(
    settings: TrackerSettings,
    store: Option<&StateStore>,
    config: &Config,
    window: Window,
) -> Result<()> {
    let Some(store) = store else {
        bail!("--reset needs a state file (general.state_file is empty)");
    };

    let state = store.load()?.unwrap_or_default();
    let mut engine = AggregationEngine::with_state(settings, state);
    engine.force_reset(window, Utc::now());
    store.save(engine.state())?;

    if let Some(daily) = engine.take_daily_report() {
        let path = Path::new(&config.report.daily_dir).join(report::daily_report_file_name(&daily));
        report::write_report(&report::generate_daily_report(&daily), &path)?;
        println!("📝 Daily report saved to {}", path.display());
    }

    println!("✅ {} XP reset saved to {}", window, store.path().display());
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
