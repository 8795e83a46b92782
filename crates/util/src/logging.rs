//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Installs a formatted tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `default_filter`
/// (usually [`EngineConfig::log_filter`](crate::EngineConfig)). Returns `false`
/// when a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_ok()
}
