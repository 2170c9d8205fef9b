//! # wia-search
//!
//! Federated artist and event search for Where It's At.
//!
//! A single query is fanned out concurrently to every registered provider
//! adapter (music catalogues, ticketing APIs, optional HTML scrapers). The
//! per-source answers are merged, deduplicated, ranked and memoised for a
//! while, and every call returns a populated [`AggregatedResults`] even when
//! some providers are down.
//!
//! ## Design
//!
//! - Adapters implement [`MusicSource`], [`EventSource`] or [`Scraper`] and
//!   are registered once in an immutable [`SourceRegistry`]
//! - Concurrency is capped with a semaphore; each source call runs under a
//!   [`SearchContext`] carrying cancellation and a deadline
//! - Merge order follows registration order, so identical inputs give
//!   identical output
//! - In-memory TTL cache with lazy expiry
//! - Per-source circuit breaker feeding [`Aggregator::source_stats`]
//! - Three outbound rate-limit policies for adapters to pick from
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> wia_search::Result<()> {
//! use wia_search::{Aggregator, AggregatorConfig, SearchContext, SourceRegistry};
//!
//! let registry = SourceRegistry::builder().build()?;
//! let aggregator = Aggregator::new(AggregatorConfig::default(), registry)?;
//! let results = aggregator
//!     .search_artists(&SearchContext::new(), "radiohead", 10)
//!     .await?;
//! println!("{} artists, {} failed sources", results.total_results, results.errors.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - Query strings are logged only at trace level
//! - No network listeners; this is a library, not a server

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod rate_limit;
pub mod registry;
pub mod scrape;
pub mod source;
pub mod types;

pub use cache::ResultCache;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
pub use config::{AggregatorConfig, ScrapeConfig, DEFAULT_LIMIT};
pub use context::SearchContext;
pub use error::{RateLimitExceeded, Result, SearchError, SourceError};
pub use http::ScrapeClient;
pub use orchestrator::Aggregator;
pub use rate_limit::{FixedWindowLimiter, IntervalThrottle, RateLimiter, SlidingWindowLimiter};
pub use registry::{SourceRegistry, SourceRegistryBuilder};
pub use scrape::ScrapedEvent;
pub use source::{EventSource, MusicSource, Scraper};
pub use types::{
    AggregatedResults, Artist, Event, SourceInfo, SourceKind, SourceStatus, Venue,
};
