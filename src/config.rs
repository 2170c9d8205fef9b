//! Application configuration: TOML file plus `WHEREITS_*` environment overrides.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wia_search::{AggregatorConfig, ScrapeConfig, DEFAULT_LIMIT};

use crate::error::{AppError, Result};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "WHEREITS_";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fan-out, caching and dedup behaviour of the search core.
    pub search: AggregatorConfig,
    /// HTTP behaviour shared by HTML scrapers.
    pub scrapers: ScrapeConfig,
    /// Request limits applied before the search core is called.
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// Limits enforced by [`crate::SearchService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Used when a request asks for 0 results.
    pub default_limit: usize,
    /// Larger requests are clamped to this.
    pub max_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "where_its_at=info,wia_search=info".to_owned(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Effective configuration: `path` if it exists (defaults otherwise),
    /// then process environment overrides, then validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or malformed, an override
    /// cannot be parsed, or the result fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file path: `~/.config/where-its-at/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config)
                .join("where-its-at")
                .join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("where-its-at")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/where-its-at/config.toml")
        }
    }

    /// Apply `WHEREITS_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] naming the variable if a value does not parse.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw) = var("SEARCH_MAX_CONCURRENT_REQUESTS") {
            self.search.max_concurrent_requests = parse("SEARCH_MAX_CONCURRENT_REQUESTS", &raw)?;
        }
        if let Some(raw) = var("SEARCH_REQUEST_TIMEOUT_MS") {
            self.search.request_timeout_ms = parse("SEARCH_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = var("SEARCH_CACHE_ENABLED") {
            self.search.cache_enabled = parse_flag("SEARCH_CACHE_ENABLED", &raw)?;
        }
        if let Some(raw) = var("SEARCH_CACHE_TTL_SECS") {
            self.search.cache_ttl_secs = parse("SEARCH_CACHE_TTL_SECS", &raw)?;
        }
        if let Some(raw) = var("SEARCH_INCLUDE_SCRAPERS") {
            self.search.include_scrapers = parse_flag("SEARCH_INCLUDE_SCRAPERS", &raw)?;
        }
        if let Some(agent) = var("SCRAPER_USER_AGENT") {
            self.scrapers.user_agent = Some(agent);
        }
        if let Some(raw) = var("SCRAPER_REQUEST_DELAY_MS") {
            self.scrapers.request_delay_ms = parse("SCRAPER_REQUEST_DELAY_MS", &raw)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if any section is invalid.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.scrapers.validate()?;
        if self.service.default_limit == 0 {
            return Err(AppError::Config(
                "service.default_limit must be greater than 0".into(),
            ));
        }
        if self.service.max_limit < self.service.default_limit {
            return Err(AppError::Config(
                "service.max_limit must be at least service.default_limit".into(),
            ));
        }
        Ok(())
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{ENV_PREFIX}{name}={raw:?}: {e}")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{ENV_PREFIX}{name}={raw:?}: expected true or false"
        ))),
    }
}
