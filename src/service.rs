//! Request-facing search service.
//!
//! [`SearchService`] sits between a caller (a UI, an HTTP handler, the
//! config checker) and the [`Aggregator`]. It rejects blank input, applies
//! the configured limit policy and hands everything else to the core.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wia_search::{AggregatedResults, Aggregator, SearchContext, SourceInfo, SourceRegistry};

use crate::config::{AppConfig, ServiceConfig};
use crate::error::{AppError, Result};

/// Operations exposed to callers of the search core.
#[async_trait]
pub trait AggregatorService: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a blank query, or
    /// [`AppError::Search`] on a structural failure of the core.
    async fn search_artists(
        &self,
        ctx: &SearchContext,
        query: &str,
        limit: usize,
    ) -> Result<AggregatedResults>;

    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a blank artist name, or
    /// [`AppError::Search`] on a structural failure of the core.
    async fn search_events(
        &self,
        ctx: &SearchContext,
        artist_name: &str,
        limit: usize,
    ) -> Result<AggregatedResults>;

    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a blank city, or
    /// [`AppError::Search`] on a structural failure of the core.
    async fn search_events_by_location(
        &self,
        ctx: &SearchContext,
        city: &str,
        country: &str,
        limit: usize,
    ) -> Result<AggregatedResults>;

    /// Health of every registered source.
    fn source_stats(&self) -> BTreeMap<String, SourceInfo>;
}

/// Default [`AggregatorService`] backed by a shared [`Aggregator`].
#[derive(Debug, Clone)]
pub struct SearchService {
    aggregator: Arc<Aggregator>,
    limits: ServiceConfig,
}

impl SearchService {
    pub fn new(aggregator: Arc<Aggregator>, limits: ServiceConfig) -> Self {
        Self { aggregator, limits }
    }

    /// Build the aggregator from `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &AppConfig, registry: SourceRegistry) -> Result<Self> {
        config.validate()?;
        let aggregator = Aggregator::new(config.search.clone(), registry)?;
        Ok(Self::new(Arc::new(aggregator), config.service.clone()))
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// `0` means the configured default; anything above the maximum is clamped.
    pub fn effective_limit(&self, limit: usize) -> usize {
        match limit {
            0 => self.limits.default_limit,
            n => n.min(self.limits.max_limit),
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

#[async_trait]
impl AggregatorService for SearchService {
    async fn search_artists(
        &self,
        ctx: &SearchContext,
        query: &str,
        limit: usize,
    ) -> Result<AggregatedResults> {
        let query = required("query", query)?;
        let limit = self.effective_limit(limit);
        debug!(limit, "artist search request");
        Ok(self.aggregator.search_artists(ctx, query, limit).await?)
    }

    async fn search_events(
        &self,
        ctx: &SearchContext,
        artist_name: &str,
        limit: usize,
    ) -> Result<AggregatedResults> {
        let artist_name = required("artist name", artist_name)?;
        let limit = self.effective_limit(limit);
        debug!(limit, "event search request");
        Ok(self
            .aggregator
            .search_events(ctx, artist_name, limit)
            .await?)
    }

    async fn search_events_by_location(
        &self,
        ctx: &SearchContext,
        city: &str,
        country: &str,
        limit: usize,
    ) -> Result<AggregatedResults> {
        let city = required("city", city)?;
        let limit = self.effective_limit(limit);
        debug!(limit, "location search request");
        Ok(self
            .aggregator
            .search_events_by_location(ctx, city, country.trim(), limit)
            .await?)
    }

    fn source_stats(&self) -> BTreeMap<String, SourceInfo> {
        self.aggregator.source_stats()
    }
}
