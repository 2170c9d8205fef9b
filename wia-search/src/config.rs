//! Aggregator configuration with sensible defaults.
//!
//! [`AggregatorConfig`] controls fan-out width, deadlines, caching,
//! deduplication and whether scrapers take part. The defaults suit a
//! dozen or so third-party providers of mixed reliability.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::SearchError;

/// Limit applied when a caller passes `0`.
pub const DEFAULT_LIMIT: usize = 50;

/// Construction-time configuration for an [`crate::Aggregator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Upper bound on simultaneous outbound source calls.
    pub max_concurrent_requests: usize,
    /// Deadline for a whole fan-out, in milliseconds.
    pub request_timeout_ms: u64,
    /// Whether completed aggregates are memoised.
    pub cache_enabled: bool,
    /// How long a memoised aggregate stays valid, in seconds.
    pub cache_ttl_secs: u64,
    /// Whether records describing the same artist or event are collapsed.
    pub deduplication_enabled: bool,
    /// Whether registered scrapers join event searches.
    pub include_scrapers: bool,
    /// Result cap passed to every source call.
    pub max_results_per_source: usize,
    /// Per-source health tracking.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout_ms: 30_000,
            cache_enabled: true,
            cache_ttl_secs: 3_600,
            deduplication_enabled: true,
            include_scrapers: false,
            max_results_per_source: 20,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_concurrent_requests` must be greater than 0
    /// - `request_timeout_ms` must be greater than 0
    /// - `max_results_per_source` must be greater than 0
    /// - `cache_ttl_secs` must be greater than 0 when caching is enabled
    /// - `circuit_breaker.failure_threshold` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_concurrent_requests == 0 {
            return Err(SearchError::Config(
                "max_concurrent_requests must be greater than 0".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(SearchError::Config(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.max_results_per_source == 0 {
            return Err(SearchError::Config(
                "max_results_per_source must be greater than 0".into(),
            ));
        }
        if self.cache_enabled && self.cache_ttl_secs == 0 {
            return Err(SearchError::Config(
                "cache_ttl_secs must be greater than 0 when caching is enabled".into(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(SearchError::Config(
                "circuit_breaker.failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP behaviour of [`crate::ScrapeClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Fixed User-Agent. When `None`, a realistic browser agent is picked.
    pub user_agent: Option<String>,
    /// Minimum gap between two requests from one client, in milliseconds.
    pub request_delay_ms: u64,
    /// Extra attempts after the first for retryable failures.
    pub max_retries: u32,
    /// Per-request HTTP timeout, in seconds.
    pub timeout_secs: u64,
    /// Base backoff; attempt `n` waits `n * n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    /// Pause after a `429 Too Many Requests`, in milliseconds.
    pub rate_limited_pause_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_delay_ms: 2_000,
            max_retries: 3,
            timeout_secs: 30,
            retry_backoff_ms: 1_000,
            rate_limited_pause_ms: 5_000,
        }
    }
}

impl ScrapeConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(attempt).saturating_mul(u64::from(attempt));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    pub fn rate_limited_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limited_pause_ms)
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for a zero timeout or an empty custom
    /// User-Agent.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_secs == 0 {
            return Err(SearchError::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self
            .user_agent
            .as_deref()
            .is_some_and(|ua| ua.trim().is_empty())
        {
            return Err(SearchError::Config("user_agent must not be empty".into()));
        }
        Ok(())
    }
}
