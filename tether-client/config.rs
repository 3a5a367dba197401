//! Project configuration for one analysis session: a TOML descriptor next to
//! the project naming the root, the cache directory, and an optional display
//! name.

use std::{
  fs,
  path::{
    Path,
    PathBuf,
  },
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{
  info,
  warn,
};

/// Name of the environment variable that turns on verbose outbound logging.
/// Read once at engine construction.
pub const DEBUG_ENV_VAR: &str = "TETHER_DEBUG";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
  name:      String,
  root_dir:  PathBuf,
  cache_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
  #[serde(default)]
  name:      Option<String>,
  #[serde(rename = "root-dir")]
  root_dir:  PathBuf,
  #[serde(rename = "cache-dir")]
  cache_dir: PathBuf,
}

impl ProjectConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = fs::read_to_string(path).map_err(|err| ConfigError::Read {
      path: path.to_path_buf(),
      source: err,
    })?;
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<Self, ConfigError> {
    let raw: RawConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
    let name = match raw.name {
      Some(name) => name,
      None => raw
        .root_dir
        .file_name()
        .map(|base| base.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string()),
    };
    Ok(Self {
      name,
      root_dir: raw.root_dir,
      cache_dir: raw.cache_dir,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  /// Create the cache/log directory if missing. The server launcher usually
  /// creates it, but we shouldn't depend on that. Failure degrades logging
  /// only and is never fatal.
  pub fn ensure_cache_dir(&self) -> bool {
    match fs::create_dir_all(&self.cache_dir) {
      Ok(()) => {
        info!(project = %self.name, dir = %self.cache_dir.display(), "cache directory ready");
        true
      },
      Err(err) => {
        warn!(
          error = %err,
          dir = %self.cache_dir.display(),
          "could not create cache directory, log output will be degraded"
        );
        false
      },
    }
  }
}

/// Whether verbose outbound logging was requested for this process.
pub fn debug_verbosity() -> bool {
  std::env::var_os(DEBUG_ENV_VAR).is_some()
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read project config {path}: {source}")]
  Read {
    path:   PathBuf,
    source: std::io::Error,
  },
  #[error("failed to parse project config: {0}")]
  Parse(toml::de::Error),
}
