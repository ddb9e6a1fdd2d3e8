//! Where configuration and logs live, and how layered TOML files combine.

use std::path::{
  Path,
  PathBuf,
};

use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};

const APP_DIR: &str = "the-editor";

fn expand_tilde(path: &Path) -> PathBuf {
  match path.strip_prefix("~") {
    Ok(rest) => match etcetera::home_dir() {
      Ok(home) => home.join(rest),
      Err(_) => path.to_owned(),
    },
    Err(_) => path.to_owned(),
  }
}

/// User configuration directory. `THE_EDITOR_CONFIG_DIR` takes precedence.
pub fn config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("THE_EDITOR_CONFIG_DIR") {
    return expand_tilde(Path::new(&dir));
  }
  match choose_base_strategy() {
    Ok(strategy) => strategy.config_dir().join(APP_DIR),
    Err(err) => {
      log::warn!("unable to find the config directory: {err}");
      PathBuf::from(".").join(APP_DIR)
    },
  }
}

/// Cache directory, home of the log file. `THE_EDITOR_CACHE_DIR` takes
/// precedence.
pub fn cache_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("THE_EDITOR_CACHE_DIR") {
    return expand_tilde(Path::new(&dir));
  }
  match choose_base_strategy() {
    Ok(strategy) => strategy.cache_dir().join(APP_DIR),
    Err(err) => {
      log::warn!("unable to find the cache directory: {err}");
      std::env::temp_dir().join(APP_DIR)
    },
  }
}

pub fn config_file() -> PathBuf {
  config_dir().join("config.toml")
}

pub fn default_log_file() -> PathBuf {
  cache_dir().join("the-editor.log")
}

/// `.the-editor/config.toml` of the workspace containing the current
/// directory.
pub fn workspace_config_file() -> PathBuf {
  let cwd = std::env::current_dir().unwrap_or_default();
  find_workspace_in(cwd).0.join(".the-editor").join("config.toml")
}

/// Walk up from `dir` to the first directory holding `.git`, `.jj` or
/// `.the-editor`. Returns `(dir, true)` when there is none.
pub fn find_workspace_in(dir: impl AsRef<Path>) -> (PathBuf, bool) {
  let dir = dir.as_ref();
  for ancestor in dir.ancestors() {
    if ancestor.join(".git").exists()
      || ancestor.join(".jj").exists()
      || ancestor.join(".the-editor").exists()
    {
      return (ancestor.to_owned(), false);
    }
  }
  (dir.to_owned(), true)
}

pub fn ensure_parent_dir(path: &Path) {
  if let Some(parent) = path.parent()
    && !parent.exists()
  {
    std::fs::create_dir_all(parent).ok();
  }
}

/// Merge `right` onto `left`.
///
/// Tables present on both sides are merged key by key down to `merge_depth`
/// levels; below that, and for every other kind of value, `right` wins.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (name, rvalue) in right_map {
        let merged = match left_map.remove(&name) {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_map.insert(name, merged);
      }
      Value::Table(left_map)
    },
    (_, value) => value,
  }
}
