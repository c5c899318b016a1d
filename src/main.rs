//! MATCHCAST: fixture forecasting and simulation engine.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the providers, and runs the refresh loop with graceful shutdown.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use matchcast::config::AppConfig;
use matchcast::data::espn::EspnClient;
use matchcast::data::sofascore::SofaScoreClient;
use matchcast::data::DeepStatsProvider;
use matchcast::engine::pipeline::{CycleReport, Pipeline, Providers};

const BANNER: &str = r#"
  __  __    _  _____ ____ _   _  ____    _    ____ _____
 |  \/  |  / \|_   _/ ___| | | |/ ___|  / \  / ___|_   _|
 | |\/| | / _ \ | || |   | |_| | |     / _ \ \___ \ | |
 | |  | |/ ___ \| || |___|  _  | |___ / ___ \ ___) || |
 |_|  |_/_/   \_\_| \____|_| |_|\____/_/   \_\____/ |_|

  Fixture forecasting and simulation engine
  v0.1.0
"#;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = if Path::new(CONFIG_PATH).exists() {
        AppConfig::load(CONFIG_PATH)?
    } else {
        AppConfig::default()
    };

    init_logging();

    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        refresh_interval_secs = cfg.engine.refresh_interval_secs,
        leagues = cfg.leagues.len(),
        days_ahead = cfg.engine.days_ahead,
        "MATCHCAST starting up"
    );

    // -- Providers -------------------------------------------------------

    let timeout = Duration::from_secs(cfg.engine.request_timeout_secs);
    let espn = Arc::new(EspnClient::new(timeout)?);
    let deep_stats: Option<Arc<dyn DeepStatsProvider>> = if cfg.engine.deep_stats_enabled {
        Some(Arc::new(SofaScoreClient::new(timeout)?))
    } else {
        warn!("Deep-stats provider disabled");
        None
    };
    let providers = Providers {
        fixtures: espn.clone(),
        standings: espn,
        deep_stats,
    };

    // League weights and the classifier are re-read at the start of each cycle.
    let mut pipeline = Pipeline::new(cfg.clone(), providers);

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.engine.refresh_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.engine.refresh_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match pipeline.run_cycle(Utc::now().date_naive()).await {
                    Ok(output) => log_cycle_report(&output.report),
                    Err(e) => error!(error = %e, "Cycle failed, continuing to next"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let summary = pipeline.ledger().summary();
    info!(
        cycles = pipeline.cycle(),
        won = summary.won,
        lost = summary.lost,
        hit_rate = ?summary.hit_rate(),
        "MATCHCAST shut down cleanly."
    );

    Ok(())
}

/// Log the ledger totals after a cycle.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle,
        seed = report.seed,
        open = report.ledger.open,
        won = report.ledger.won,
        lost = report.ledger.lost,
        pending = report.ledger.pending,
        hit_rate = ?report.ledger.hit_rate(),
        "Ledger"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("matchcast=info"));

    let json_logging = std::env::var("MATCHCAST_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
