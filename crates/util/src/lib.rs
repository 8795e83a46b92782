//! Ambient helpers shared by the exertion runtime crates.

pub mod async_runtime;
pub mod config;
pub mod logging;

pub use async_runtime::block_on_future;
pub use config::{CONFIG_PATH_ENV, ConfigError, EngineConfig};
pub use logging::init_tracing;

use std::path::PathBuf;

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs_next::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs_next::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}
