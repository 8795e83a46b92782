//! Engine configuration.
//!
//! Settings live in a small YAML (or JSON) document. The file is located through an
//! explicit path, the `EXERT_CONFIG_PATH` environment variable, or the platform
//! config directory (`~/.config/exert/engine.yaml` on most platforms). A missing
//! file yields defaults; a malformed one is reported.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use exert_types::Flow;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::expand_tilde;

/// Environment variable allowing callers to override the config file path.
pub const CONFIG_PATH_ENV: &str = "EXERT_CONFIG_PATH";

/// Default filename inside the config directory.
pub const CONFIG_FILE_NAME: &str = "engine.yaml";

/// Error surfaced when reading the configuration fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config YAML error at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables of the dispatcher and context store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of link hops while resolving one path.
    #[serde(default = "default_max_link_depth")]
    pub max_link_depth: usize,
    /// Iteration bound for loops that do not declare one.
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u32,
    /// Upper bound on concurrently running job children.
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
    /// Flow used when a control strategy leaves it unset.
    #[serde(default)]
    pub default_flow: Flow,
    /// Poll interval of the background job monitor.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Default tracing filter directive.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_link_depth: default_max_link_depth(),
            max_loop_iterations: default_max_loop_iterations(),
            max_parallelism: default_max_parallelism(),
            default_flow: Flow::Sequential,
            monitor_interval_ms: default_monitor_interval_ms(),
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Loads configuration from `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no engine config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let is_json = path.extension().and_then(|extension| extension.to_str()) == Some("json");
        let config = if is_json {
            serde_json::from_str(&data).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }
}

/// Path consulted by [`EngineConfig::load`].
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("exert").join(CONFIG_FILE_NAME)
}

fn default_max_link_depth() -> usize {
    32
}

fn default_max_loop_iterations() -> u32 {
    100
}

fn default_max_parallelism() -> usize {
    8
}

fn default_monitor_interval_ms() -> u64 {
    250
}

fn default_log_filter() -> String {
    "info".to_string()
}
