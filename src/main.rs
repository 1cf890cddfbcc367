//! Civ Matchup
//!
//! Runs unattended Civilization VI AI-vs-AI matches back to back from a
//! saved game configuration and appends each result to a CSV log.

mod automation;
mod capture;
mod error;
mod ocr;
mod paths;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "civ_matchup.log";
const LOG_TIME_FORMAT: &str = "%H:%M:%S%.3f";

#[derive(Parser)]
#[command(name = "civ-matchup")]
#[command(about = "Automated Civilization VI AI matchups", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories().context("Failed to create output directories")?;
    init_logging(cli.debug)?;
    install_panic_hook();

    #[cfg(windows)]
    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    automation::init_config();
    let config = automation::get_config().clone();

    tracing::info!("Civ Matchup started");
    if let Err(e) = automation::run_session(config) {
        tracing::error!("Session failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Logs to both the console and `<exe_dir>/logs/civ_matchup.log`.
///
/// `RUST_LOG` overrides the level picked by `--debug`.
fn init_logging(debug: bool) -> Result<()> {
    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()));
    let file = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

/// Routes panics through the logger so they end up in the log file.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        tracing::error!("[PANIC]{} {}", location, msg);
    }));
}
