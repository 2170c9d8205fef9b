//! Error types for the wia-search crate.
//!
//! [`SearchError`] is structural and is the only thing an aggregate search
//! call can return as `Err`. [`SourceError`] describes a single collaborator
//! failing and is recorded in the aggregate's `errors` list instead of
//! aborting the call.

use std::time::Duration;

/// Structural failures of the aggregator itself.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Invalid construction-time configuration or source registry.
    #[error("config error: {0}")]
    Config(String),

    /// The result cache could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),
}

/// Convenience type alias for wia-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Returned by a rejecting rate limiter once its quota is spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded: {limit} requests per {}s", .window.as_secs())]
pub struct RateLimitExceeded {
    /// Configured number of requests allowed per window.
    pub limit: usize,
    /// Length of the quota window.
    pub window: Duration,
}

/// A failure of one source during a fan-out call.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport-level failure talking to the provider.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The provider's payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The local quota for this provider is spent.
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    /// The request deadline passed before the source answered.
    #[error("request deadline exceeded")]
    Timeout,

    /// The caller cancelled the search.
    #[error("request cancelled")]
    Cancelled,

    /// The source is tripped in the circuit breaker and was skipped.
    #[error("circuit open")]
    CircuitOpen,

    /// The source refused the query before making a request.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The task running the source call ended without reporting back.
    #[error("source task aborted")]
    Aborted,
}

impl SourceError {
    /// Whether this failure says something about the provider's health.
    ///
    /// Local refusals (quota, cancellation, bad input, skipped circuit) do not.
    pub fn counts_against_health(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Status(_) | Self::Decode(_) | Self::Timeout | Self::Aborted
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config() {
        let err = SearchError::Config("max_concurrent_requests must be > 0".into());
        assert_eq!(
            err.to_string(),
            "config error: max_concurrent_requests must be > 0"
        );
    }

    #[test]
    fn display_cache() {
        let err = SearchError::Cache("lock poisoned".into());
        assert_eq!(err.to_string(), "cache error: lock poisoned");
    }

    #[test]
    fn display_rate_limited_is_transparent() {
        let err: SourceError = RateLimitExceeded {
            limit: 1000,
            window: Duration::from_secs(86_400),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "rate limit exceeded: 1000 requests per 86400s"
        );
    }

    #[test]
    fn display_status_and_timeout() {
        assert_eq!(SourceError::Status(503).to_string(), "unexpected status 503");
        assert_eq!(SourceError::Timeout.to_string(), "request deadline exceeded");
        assert_eq!(SourceError::CircuitOpen.to_string(), "circuit open");
    }

    #[test]
    fn health_accounting() {
        assert!(SourceError::Timeout.counts_against_health());
        assert!(SourceError::Status(500).counts_against_health());
        assert!(SourceError::Http("reset".into()).counts_against_health());
        assert!(!SourceError::Cancelled.counts_against_health());
        assert!(!SourceError::CircuitOpen.counts_against_health());
        assert!(!SourceError::InvalidQuery("empty".into()).counts_against_health());
        let limited: SourceError = RateLimitExceeded {
            limit: 1,
            window: Duration::from_secs(1),
        }
        .into();
        assert!(!limited.counts_against_health());
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
        assert_send_sync::<SourceError>();
    }
}
