//! SLIPFORGE: daily value-pool, single-pick and parlay decision engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! resolves the cycle day and runs one stage (or all of them) over that
//! day's snapshots. Stage summaries are printed to stdout as JSON.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use slipforge::config::AppConfig;
use slipforge::engine::cycle_day::{current_cycle_day, parse_day};
use slipforge::engine::{Pipeline, Stage, StageSummary};
use slipforge::storage::FsStore;

const BANNER: &str = r#"
 ___ _    ___ ___ ___ ___  ___  ___ ___
/ __| |  |_ _| _ \ __/ _ \| _ \/ __| __|
\__ \ |__ | ||  _/ _| (_) |   / (_ | _|
|___/____|___|_| |_| \___/|_|_\\___|___|

  Value pools, single picks and parlays
"#;

/// Daily value-pool, single-pick and parlay decision engine
#[derive(Parser)]
#[command(name = "slipforge", version, about)]
struct Cli {
    /// Cycle day (YYYY-MM-DD). Defaults to the current cycle day.
    day: Option<String>,

    /// Stage to run: evaluate, pools, singles, parlays, card or all.
    #[arg(long, default_value = "all")]
    stage: String,

    /// Recompute even when outputs already exist.
    #[arg(long)]
    force: bool,

    /// Path to the TOML configuration.
    #[arg(long, env = "SLIPFORGE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `engine.data_dir`.
    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    init_logging();
    eprintln!("{BANNER}");

    let mut cfg = AppConfig::load_or_default(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        cfg.engine.data_dir = dir;
    }

    let day = match cli.day {
        Some(day) => {
            parse_day(&day)?;
            day
        }
        None => current_cycle_day(cfg.engine.utc_offset_minutes, cfg.engine.cutoff_hour)?,
    };

    info!(
        day = %day,
        stage = %cli.stage,
        force = cli.force,
        data_dir = %cfg.engine.data_dir,
        stake = cfg.engine.stake,
        "SLIPFORGE starting"
    );

    let pipeline = Pipeline::new(FsStore::new(&cfg.engine.data_dir), &cfg);

    let summaries: Vec<StageSummary> = if cli.stage.trim().eq_ignore_ascii_case("all") {
        pipeline.run_all(&day, cli.force)?
    } else {
        let stage: Stage = cli.stage.parse()?;
        vec![pipeline.run_stage(&day, stage, cli.force)?]
    };

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

/// Initialise the `tracing` subscriber. Logs go to stderr so stdout
/// carries only the summaries.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("slipforge=info"));

    let json_logging = std::env::var("SLIPFORGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
