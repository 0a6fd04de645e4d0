//! Structured logging for the fleet monitor
//!
//! Human-readable output on stderr plus daily-rotated JSON files under the
//! platform config directory.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system and return the log directory.
///
/// The default level is INFO; set `RUST_LOG` to override (e.g.
/// `RUST_LOG=fleetmon=debug`). Safe to call when a subscriber is already
/// installed, which happens under the test harness.
pub fn init_logging() -> Result<PathBuf> {
    let log_dir = log_directory()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "fleetmon.log");

    let console_layer = fmt::layer()
        .with_target(false)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .json();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        if e.to_string().contains("already been set") {
            return Ok(log_dir);
        }
        return Err(anyhow!(e));
    }

    tracing::info!("Logging initialized. Log directory: {}", log_dir.display());

    Ok(log_dir)
}

/// `%APPDATA%/fleetmon/logs` on Windows, `~/.config/fleetmon/logs` elsewhere.
fn log_directory() -> Result<PathBuf> {
    let base_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .context("Could not find APPDATA directory")?
            .join("fleetmon")
    } else {
        dirs::config_dir()
            .context("Could not find config directory")?
            .join("fleetmon")
    };

    Ok(base_dir.join("logs"))
}
