//! Tracing subscriber setup.
//!
//! All output goes to stderr. `RUST_LOG` wins over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{AppError, Result};

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`AppError::Logging`] if the configured filter is malformed or a
/// global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

/// Parse `directives` (e.g. `"where_its_at=info,wia_search=debug"`).
///
/// # Errors
///
/// Returns [`AppError::Logging`] if a directive is invalid.
pub fn filter_for(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| AppError::Logging(format!("invalid log filter {directives:?}: {e}")))
}
