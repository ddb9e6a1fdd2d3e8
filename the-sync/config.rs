use std::{
  fs,
  io::Error as IOError,
  time::Duration,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;
use toml::{
  Value,
  de::Error as TomlError,
};

use crate::paths::{
  self,
  merge_toml_values,
};

/// Durations are written as whole milliseconds.
mod duration_ms {
  use std::time::Duration;

  use serde::{
    Deserialize,
    Deserializer,
    Serializer,
  };

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
  }
}

/// Tuning of the editor viewport sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SyncConfig {
  /// Documents with at least this many lines skip tokenization.
  pub large_file_lines:     usize,
  /// Documents with at least this many lines are edited through a window.
  pub huge_file_lines:      usize,
  /// Lines fetched beyond each edge of the visible range.
  pub prefetch_buffer:      usize,
  #[serde(with = "duration_ms")]
  pub fast_scroll_window:   Duration,
  /// Jump (in lines) that counts as a fast scroll inside the window.
  pub fast_scroll_jump:     usize,
  pub max_adaptive_buffer:  usize,
  #[serde(with = "duration_ms")]
  pub huge_debounce:        Duration,
  #[serde(with = "duration_ms")]
  pub large_debounce:       Duration,
  #[serde(with = "duration_ms")]
  pub drag_debounce:        Duration,
  #[serde(with = "duration_ms")]
  pub fast_scroll_debounce: Duration,
  #[serde(with = "duration_ms")]
  pub normal_debounce:      Duration,
  #[serde(with = "duration_ms")]
  pub edit_sync_debounce:   Duration,
  #[serde(with = "duration_ms")]
  pub window_unlock_delay:  Duration,
  #[serde(with = "duration_ms")]
  pub navigation_frame:     Duration,
  #[serde(with = "duration_ms")]
  pub navigation_settle:    Duration,
  #[serde(with = "duration_ms")]
  pub outline_flash:        Duration,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      large_file_lines:     20_000,
      huge_file_lines:      200_000,
      prefetch_buffer:      40,
      fast_scroll_window:   Duration::from_millis(90),
      fast_scroll_jump:     24,
      max_adaptive_buffer:  240,
      huge_debounce:        Duration::from_millis(120),
      large_debounce:       Duration::from_millis(80),
      drag_debounce:        Duration::from_millis(16),
      fast_scroll_debounce: Duration::from_millis(12),
      normal_debounce:      Duration::from_millis(36),
      edit_sync_debounce:   Duration::from_millis(24),
      window_unlock_delay:  Duration::from_millis(260),
      navigation_frame:     Duration::from_millis(16),
      navigation_settle:    Duration::from_millis(60),
      outline_flash:        Duration::from_millis(1200),
    }
  }
}

/// Tuning of the dual-panel diff view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DiffConfig {
  #[serde(with = "duration_ms")]
  pub side_commit_debounce: Duration,
  #[serde(with = "duration_ms")]
  pub preview_debounce:     Duration,
  /// An edit younger than this counts as active typing.
  #[serde(with = "duration_ms")]
  pub typing_hold:          Duration,
  #[serde(with = "duration_ms")]
  pub refresh_debounce:     Duration,
  /// Delay before a reflow restores caret and scroll.
  #[serde(with = "duration_ms")]
  pub restore_frame:        Duration,
}

impl Default for DiffConfig {
  fn default() -> Self {
    Self {
      side_commit_debounce: Duration::from_millis(90),
      preview_debounce:     Duration::from_millis(70),
      typing_hold:          Duration::from_millis(450),
      refresh_debounce:     Duration::from_millis(120),
      restore_frame:        Duration::from_millis(16),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
  pub sync: SyncConfig,
  pub diff: DiffConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigRaw {
  sync: Option<Value>,
  diff: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error("bad config: {0}")]
  BadConfig(#[from] TomlError),
  #[error(transparent)]
  Error(#[from] IOError),
}

fn section<T>(global: Option<Value>, local: Option<Value>) -> Result<T, ConfigLoadError>
where
  T: Default + for<'de> Deserialize<'de>,
{
  let section = match (global, local) {
    (None, None) => return Ok(T::default()),
    (None, Some(value)) | (Some(value), None) => value,
    (Some(global), Some(local)) => merge_toml_values(global, local, 3),
  };
  Ok(section.try_into()?)
}

impl Config {
  /// Combine the global and the workspace config. A file that could not be
  /// read is skipped; a file that does not parse is an error.
  pub fn load(
    global: Result<String, ConfigLoadError>,
    local: Result<String, ConfigLoadError>,
  ) -> Result<Config, ConfigLoadError> {
    let global_config: Result<ConfigRaw, ConfigLoadError> =
      global.and_then(|file| toml::from_str(&file).map_err(ConfigLoadError::BadConfig));
    let local_config: Result<ConfigRaw, ConfigLoadError> =
      local.and_then(|file| toml::from_str(&file).map_err(ConfigLoadError::BadConfig));

    let (global, local) = match (global_config, local_config) {
      (_, Err(ConfigLoadError::BadConfig(err))) | (Err(ConfigLoadError::BadConfig(err)), _) => {
        return Err(ConfigLoadError::BadConfig(err));
      },
      (Ok(global), Ok(local)) => (Some(global), Some(local)),
      (Ok(config), Err(_)) => (Some(config), None),
      (Err(_), Ok(config)) => (None, Some(config)),
      (Err(_), Err(_)) => (None, None),
    };

    let (global_sync, global_diff) = global.map_or((None, None), |raw| (raw.sync, raw.diff));
    let (local_sync, local_diff) = local.map_or((None, None), |raw| (raw.sync, raw.diff));

    Ok(Config {
      sync: section(global_sync, local_sync)?,
      diff: section(global_diff, local_diff)?,
    })
  }

  /// Load `config.toml` from the user config dir merged with the workspace
  /// `.the-editor/config.toml`.
  pub fn load_user() -> Result<Config, ConfigLoadError> {
    let global = fs::read_to_string(paths::config_file()).map_err(ConfigLoadError::Error);
    let local = fs::read_to_string(paths::workspace_config_file()).map_err(ConfigLoadError::Error);
    Self::load(global, local)
  }
}
