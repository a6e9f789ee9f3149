//! Tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "notion-invoice.log";

/// Where log lines go
pub enum LogTarget<'a> {
  /// Standard output, for the HTTP server
  Stdout,
  /// Daily rolling file in `dir`, keeping stdout for command output
  File(&'a Path),
}

/// RUST_LOG, else the configured level, else info
fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
  if let Ok(filter) = EnvFilter::try_from_default_env() {
    return Ok(filter);
  }
  EnvFilter::try_new(level.unwrap_or("info"))
    .map_err(|e| eyre!("Invalid log level '{}': {}", level.unwrap_or("info"), e))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held
/// until exit.
pub fn init(target: LogTarget<'_>, level: Option<&str>) -> Result<Option<WorkerGuard>> {
  let filter = build_filter(level)?;

  match target {
    LogTarget::Stdout => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(None)
    }
    LogTarget::File(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(Some(guard))
    }
  }
}
