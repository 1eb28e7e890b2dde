//! Engine binary for the Touchline simulation.
//!
//! Runs a single session and logs its feed. This stands in for the
//! presentation layer during development: every goal is announced in the
//! log and every fusion publish is logged with its mode-specific cue.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `touchline-config.yaml` (or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Create and initialize the session in the configured mode
//! 4. Subscribe the feed logger
//! 5. Start the session and wait for Ctrl-C or the configured time limit
//! 6. Stop the session and log the final state

mod error;
mod feed_logger;

use std::path::Path;
use std::time::Duration;

use touchline_core::config::TouchlineConfig;
use touchline_core::session::SimulationSession;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the session fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so note the source later.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(from_file, "touchline-engine starting");
    info!(
        mode = %config.session.mode,
        seed = config.session.seed,
        frame_interval_ms = config.session.frame_interval_ms,
        emotion_interval_ms = config.session.emotion_interval_ms,
        fusion_interval_ms = config.session.fusion_interval_ms,
        warmup_ms = config.session.warmup_ms,
        "Configuration loaded"
    );

    run(&config).await?;

    info!("touchline-engine stopped");
    Ok(())
}

/// Run one session until interrupted or the time limit passes.
async fn run(config: &TouchlineConfig) -> Result<(), EngineError> {
    // 3. Create and initialize the session.
    let mut session = SimulationSession::new(config)?;
    let mode = session.initialize(&config.session.mode)?;

    // 4. Subscribe the feed logger.
    let _feed_log = session.subscribe(feed_logger::log_event);

    // 5. Start and wait.
    session.start()?;
    info!(session_id = %session.id(), mode = %mode, "Session running");

    let limit = config.session.max_real_time_seconds;
    if limit > 0 {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupt received");
            }
            () = tokio::time::sleep(Duration::from_secs(limit)) => {
                info!(max_real_time_seconds = limit, "Real-time limit reached");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received");
    }

    // 6. Stop and report.
    session.stop().await?;
    let snapshot = session.snapshot();
    info!(
        team_a = snapshot.score.team_a,
        team_b = snapshot.score.team_b,
        match_time = %snapshot.match_time,
        frames = snapshot.frame,
        last_fusion = ?snapshot.fusion,
        "Final state"
    );
    Ok(())
}

/// Load configuration from `touchline-config.yaml` in the working
/// directory, falling back to defaults when the file is absent.
///
/// Returns the configuration and whether it came from the file.
fn load_config() -> Result<(TouchlineConfig, bool), EngineError> {
    let config_path = Path::new("touchline-config.yaml");
    if config_path.exists() {
        Ok((TouchlineConfig::from_file(config_path)?, true))
    } else {
        let mut config = TouchlineConfig::default();
        config.session.apply_env_overrides();
        Ok((config, false))
    }
}
