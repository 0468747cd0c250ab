use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

const LOG_FILE_NAME: &str = "ghtail.log";
const DEFAULT_FILTER: &str = "info";

/// Directory the log file goes to: the configured one, else the user cache dir.
pub fn log_dir(configured: Option<&str>) -> PathBuf {
    match configured {
        Some(dir) => PathBuf::from(dir),
        None => dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ghtail"),
    }
}

/// Sends all tracing output to a file; stdout belongs to the tailed log.
pub fn setup_logging(configured_dir: Option<&str>) -> Result<PathBuf> {
    let dir = log_dir(configured_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &dir, LOG_FILE_NAME);

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_timer(SystemTime)
        .with_writer(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let log_file = dir.join(LOG_FILE_NAME);
    tracing::info!("Logging system initialized. Writing to {}", log_file.display());

    Ok(log_file)
}
