//! Federated search orchestrator: cache, fan-out, merge, dedup, rank.
//!
//! [`Aggregator`] owns a frozen [`SourceRegistry`], an optional
//! [`ResultCache`] and a per-source [`CircuitBreaker`]. Each search runs the
//! same pipeline:
//!
//! 1. Cache lookup (hit returns immediately)
//! 2. Derive a sub-context bounded by `request_timeout_ms`
//! 3. Fan out to every source with at most `max_concurrent_requests` in flight
//! 4. Drain results in registration order, recording per-source counts and
//!    `"<source>: <cause>"` errors
//! 5. Deduplicate, sort, truncate to the requested limit
//! 6. Write through to the cache
//!
//! Source failures never fail the call. Only structural problems (a poisoned
//! cache lock) come back as `Err`.

pub mod dedup;
pub(crate) mod fanout;
pub mod ranking;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::cache::ResultCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{AggregatorConfig, DEFAULT_LIMIT};
use crate::context::SearchContext;
use crate::error::{Result, SourceError};
use crate::registry::SourceRegistry;
use crate::types::{AggregatedResults, Artist, Event, SourceInfo, SourceKind};

use self::dedup::{dedup_artists, dedup_events};
use self::fanout::{fan_out, SourceCall, SourceResult, Unit};
use self::ranking::{sort_artists, sort_events};

/// What an event search is looking for.
#[derive(Debug, Clone, Copy)]
enum EventQuery<'a> {
    Artist(&'a str),
    Location { city: &'a str, country: &'a str },
}

impl EventQuery<'_> {
    /// `(artist_name, city)` half of the cache key.
    fn cache_key(&self) -> (&str, &str) {
        match *self {
            Self::Artist(artist) => (artist, ""),
            Self::Location { city, .. } => ("", city),
        }
    }
}

/// Successful items and bookkeeping after draining a fan-out.
struct Merged<T> {
    items: Vec<T>,
    source_stats: BTreeMap<String, usize>,
    errors: Vec<String>,
}

/// Fans searches out to registered sources and merges what comes back.
#[derive(Debug)]
pub struct Aggregator {
    config: AggregatorConfig,
    registry: SourceRegistry,
    cache: Option<ResultCache>,
    breaker: Mutex<CircuitBreaker>,
}

impl Aggregator {
    /// Build an aggregator over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Config`] if `config` fails validation.
    pub fn new(config: AggregatorConfig, registry: SourceRegistry) -> Result<Self> {
        config.validate()?;

        let cache = config
            .cache_enabled
            .then(|| ResultCache::new(config.cache_ttl()));
        let breaker = Mutex::new(CircuitBreaker::new(config.circuit_breaker.clone()));

        Ok(Self {
            config,
            registry,
            cache,
            breaker,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// The result cache, `None` when caching is disabled.
    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Search every music source for artists matching `query`.
    ///
    /// A `limit` of 0 means [`DEFAULT_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Cache`] if the cache lock is poisoned.
    /// Source failures are reported in [`AggregatedResults::errors`].
    pub async fn search_artists(
        &self,
        ctx: &SearchContext,
        query: &str,
        limit: usize,
    ) -> Result<AggregatedResults> {
        let started = Instant::now();
        let limit = effective_limit(limit);
        trace!(query, limit, "artist search");

        if let Some(cache) = &self.cache {
            if let Some(mut hit) = cache.get_artists(query, limit)? {
                debug!(limit, "artist search served from cache");
                hit.search_time = started.elapsed();
                return Ok(hit);
            }
        }

        let sub = ctx.child_with_timeout(self.config.request_timeout());
        let _cancel_on_drop = sub.drop_guard();
        let per_source = self.config.max_results_per_source;
        let units = self
            .registry
            .music_sources()
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let name = source.name().to_owned();
                let ctx = sub.clone();
                let query = query.to_owned();
                let call: SourceCall<Artist> =
                    Box::pin(async move { source.search_artists(&ctx, &query, per_source).await });
                self.unit(name, call)
            })
            .collect::<Vec<_>>();

        let merged = self.merge(fan_out(units, &sub, self.config.max_concurrent_requests).await);

        let mut artists = merged.items;
        if self.config.deduplication_enabled {
            artists = dedup_artists(artists);
        }
        sort_artists(&mut artists);
        artists.truncate(limit);

        let results = AggregatedResults {
            total_results: artists.len(),
            artists,
            events: Vec::new(),
            source_stats: merged.source_stats,
            search_time: started.elapsed(),
            errors: merged.errors,
        };

        if let Some(cache) = &self.cache {
            if !ctx.is_cancelled() {
                cache.set_artists(query, limit, results.clone())?;
            }
        }
        Ok(results)
    }

    /// Search event sources (and scrapers, if enabled) for `artist_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Cache`] if the cache lock is poisoned.
    pub async fn search_events(
        &self,
        ctx: &SearchContext,
        artist_name: &str,
        limit: usize,
    ) -> Result<AggregatedResults> {
        self.search_events_with(ctx, EventQuery::Artist(artist_name), limit)
            .await
    }

    /// Search event sources (and scrapers, if enabled) for events in `city`.
    ///
    /// `country` is forwarded to sources but is not part of the cache key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SearchError::Cache`] if the cache lock is poisoned.
    pub async fn search_events_by_location(
        &self,
        ctx: &SearchContext,
        city: &str,
        country: &str,
        limit: usize,
    ) -> Result<AggregatedResults> {
        self.search_events_with(ctx, EventQuery::Location { city, country }, limit)
            .await
    }

    /// Kind and health of every registered source, keyed by name.
    ///
    /// Scrapers are listed only when `include_scrapers` is set. A name
    /// registered under two capabilities is listed with the last one, so an
    /// events or scraper registration wins over music.
    pub fn source_stats(&self) -> BTreeMap<String, SourceInfo> {
        let breaker = self.breaker();
        let mut stats = BTreeMap::new();
        for (name, kind) in self.registry.describe() {
            if kind == SourceKind::Scraper && !self.config.include_scrapers {
                continue;
            }
            let status = breaker.source_status(&name);
            stats.insert(name, SourceInfo { kind, status });
        }
        stats
    }

    async fn search_events_with(
        &self,
        ctx: &SearchContext,
        query: EventQuery<'_>,
        limit: usize,
    ) -> Result<AggregatedResults> {
        let started = Instant::now();
        let limit = effective_limit(limit);
        let (artist_key, city_key) = query.cache_key();
        trace!(?query, limit, "event search");

        if let Some(cache) = &self.cache {
            if let Some(mut hit) = cache.get_events(artist_key, city_key, limit)? {
                debug!(limit, "event search served from cache");
                hit.search_time = started.elapsed();
                return Ok(hit);
            }
        }

        let sub = ctx.child_with_timeout(self.config.request_timeout());
        let _cancel_on_drop = sub.drop_guard();
        let units = self.event_units(&sub, query);
        let merged = self.merge(fan_out(units, &sub, self.config.max_concurrent_requests).await);

        let mut events = merged.items;
        if self.config.deduplication_enabled {
            events = dedup_events(events);
        }
        sort_events(&mut events, Utc::now());
        events.truncate(limit);

        let results = AggregatedResults {
            total_results: events.len(),
            artists: Vec::new(),
            events,
            source_stats: merged.source_stats,
            search_time: started.elapsed(),
            errors: merged.errors,
        };

        if let Some(cache) = &self.cache {
            if !ctx.is_cancelled() {
                cache.set_events(artist_key, city_key, limit, results.clone())?;
            }
        }
        Ok(results)
    }

    fn event_units(&self, sub: &SearchContext, query: EventQuery<'_>) -> Vec<Unit<Event>> {
        let per_source = self.config.max_results_per_source;
        let mut units = Vec::new();

        for source in self.registry.event_sources() {
            let source = Arc::clone(source);
            let name = source.name().to_owned();
            let ctx = sub.clone();
            let call: SourceCall<Event> = match query {
                EventQuery::Artist(artist) => {
                    let artist = artist.to_owned();
                    Box::pin(async move {
                        source
                            .search_events_by_artist(&ctx, &artist, per_source)
                            .await
                    })
                }
                EventQuery::Location { city, country } => {
                    let (city, country) = (city.to_owned(), country.to_owned());
                    Box::pin(async move {
                        source
                            .search_events_by_location(&ctx, &city, &country, per_source)
                            .await
                    })
                }
            };
            units.push(self.unit(name, call));
        }

        if !self.config.include_scrapers {
            return units;
        }

        for scraper in self.registry.scrapers() {
            let scraper = Arc::clone(scraper);
            let name = scraper.name().to_owned();
            let ctx = sub.clone();
            let call: SourceCall<Event> = match query {
                EventQuery::Artist(artist) => {
                    let artist = artist.to_owned();
                    Box::pin(async move {
                        let scraped = scraper.scrape_events(&ctx, &artist, per_source).await?;
                        Ok::<Vec<Event>, SourceError>(scraped.into_iter().map(Event::from).collect())
                    })
                }
                EventQuery::Location { city, country } => {
                    let (city, country) = (city.to_owned(), country.to_owned());
                    Box::pin(async move {
                        let scraped = scraper
                            .scrape_events_by_location(&ctx, &city, &country, per_source)
                            .await?;
                        Ok::<Vec<Event>, SourceError>(scraped.into_iter().map(Event::from).collect())
                    })
                }
            };
            units.push(self.unit(name, call));
        }

        units
    }

    /// Wrap `call`, or short-circuit it if the breaker has `source` open.
    fn unit<T>(&self, source: String, call: SourceCall<T>) -> Unit<T>
    where
        T: Send + 'static,
    {
        if self.breaker().should_attempt(&source) {
            return Unit::new(source, call);
        }
        debug!(source = %source, "skipping source with open circuit");
        Unit::new(
            source,
            Box::pin(async { Err::<Vec<T>, _>(SourceError::CircuitOpen) }),
        )
    }

    /// Fold per-source outcomes into one list, in registration order.
    fn merge<T>(&self, results: Vec<SourceResult<T>>) -> Merged<T> {
        let mut merged = Merged {
            items: Vec::new(),
            source_stats: BTreeMap::new(),
            errors: Vec::new(),
        };
        let mut breaker = self.breaker();

        for SourceResult {
            source, outcome, ..
        } in results
        {
            match outcome {
                Ok(items) => {
                    debug!(source = %source, count = items.len(), "source returned results");
                    breaker.record_success(&source);
                    merged.source_stats.insert(source, items.len());
                    merged.items.extend(items);
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "source query failed");
                    if err.counts_against_health() {
                        breaker.record_failure(&source);
                    }
                    merged.errors.push(format!("{source}: {err}"));
                }
            }
        }

        merged
    }

    /// Breaker state is plain counters and survives a poisoned lock.
    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn effective_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_LIMIT
    } else {
        limit
    }
}
