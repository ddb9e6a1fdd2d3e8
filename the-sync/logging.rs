use std::path::PathBuf;

use anyhow::Context;

use crate::paths;

/// Map a `-v` count onto a level filter.
pub fn level_for_verbosity(verbosity: u8) -> log::LevelFilter {
  match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  }
}

/// Route the `log` facade to `log_file` (the cache dir log by default).
pub fn setup_logging(log_file: Option<PathBuf>, verbosity: u8) -> anyhow::Result<PathBuf> {
  let log_file = log_file.unwrap_or_else(paths::default_log_file);
  paths::ensure_parent_dir(&log_file);

  let file = fern::log_file(&log_file)
    .with_context(|| format!("failed to open log file {}", log_file.display()))?;

  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level_for_verbosity(verbosity))
    .chain(file)
    .apply()
    .context("logger already initialized")?;

  Ok(log_file)
}
