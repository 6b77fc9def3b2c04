//! File logging under `$XDG_STATE_HOME/sadash/`.
//!
//! Files rotate daily and are named `sadash.log.YYYY-MM-DD` (UTC date).

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// Prefix of every log file; the rotation date follows it
pub const LOG_FILE_PREFIX: &str = "sadash.log";

/// Install the global subscriber, writing to the state directory
///
/// `RUST_LOG` takes precedence over the configured level. Keep the returned
/// guard alive for as long as logs should be flushed.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
    let dir = Config::state_dir();
    std::fs::create_dir_all(&dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&dir)
        .map_err(|e| Error::Config(format!("failed to create log file: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    let file = log_file_for(&dir, Utc::now().date_naive());
    tracing::info!(file = %file.display(), level = %config.level, "Logging initialized");
    Ok(guard)
}

/// File the daily appender writes to on `date`
pub fn log_file_for(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}
