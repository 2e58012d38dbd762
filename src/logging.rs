//! File-based logging.
//!
//! The terminal belongs to the UI, so tracing output goes to a daily rotated
//! file under the user cache directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "countrydex.log";
const DEFAULT_FILTER: &str = "countrydex=info,warn";

/// Directory log files are written to.
pub fn log_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine cache directory")?;
    Ok(base.cache_dir().join("countrydex").join("log"))
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// The returned guard flushes pending lines when dropped; keep it alive
/// until the program exits.
pub fn init() -> Result<WorkerGuard> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log dir: {}", dir.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(dir = %dir.display(), "logging initialized");
    Ok(guard)
}
