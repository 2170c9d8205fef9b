//! Capability traits implemented by provider adapters.
//!
//! Every adapter (Spotify, Last.fm, Songkick, a venue scraper, ...) exposes
//! one or more of [`MusicSource`], [`EventSource`] and [`Scraper`]. The
//! aggregator only ever talks to these traits, so adapters can be mocked
//! freely in tests.
//!
//! Implementations must be `Send + Sync`; each call runs on its own task.
//! They should honour the [`SearchContext`] they receive, typically by
//! wrapping their network I/O in [`SearchContext::run`].

use async_trait::async_trait;

use crate::context::SearchContext;
use crate::error::SourceError;
use crate::scrape::ScrapedEvent;
use crate::types::{Artist, Event};

/// A provider that can search for artists.
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Search for artists matching `query`, returning at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, decode or quota failure.
    async fn search_artists(
        &self,
        ctx: &SearchContext,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Artist>, SourceError>;

    /// Stable identifier used in `source_stats` and error strings.
    fn name(&self) -> &str;
}

/// A provider that can search for events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Upcoming (and recent) events for `artist_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, decode or quota failure.
    async fn search_events_by_artist(
        &self,
        ctx: &SearchContext,
        artist_name: &str,
        limit: usize,
    ) -> Result<Vec<Event>, SourceError>;

    /// Events taking place in `city`. `country` may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, decode or quota failure.
    async fn search_events_by_location(
        &self,
        ctx: &SearchContext,
        city: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<Event>, SourceError>;

    fn name(&self) -> &str;
}

/// An HTML scraper producing loosely structured events.
///
/// Scraped records are converted to [`Event`] through
/// `From<ScrapedEvent> for Event` before merging.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SourceError`] if fetching or parsing the page fails.
    async fn scrape_events(
        &self,
        ctx: &SearchContext,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedEvent>, SourceError>;

    /// # Errors
    ///
    /// Returns [`SourceError`] if fetching or parsing the page fails.
    async fn scrape_events_by_location(
        &self,
        ctx: &SearchContext,
        city: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedEvent>, SourceError>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct StaticMusic {
        artists: Vec<Artist>,
    }

    #[async_trait]
    impl MusicSource for StaticMusic {
        async fn search_artists(
            &self,
            ctx: &SearchContext,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<Artist>, SourceError> {
            let artists = self.artists.clone();
            ctx.run(async move { Ok(artists.into_iter().take(limit).collect()) })
                .await
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    #[test]
    fn traits_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn MusicSource>();
        assert_send_sync::<dyn EventSource>();
        assert_send_sync::<dyn Scraper>();
    }

    #[tokio::test]
    async fn music_source_behind_arc_dyn() {
        let source: Arc<dyn MusicSource> = Arc::new(StaticMusic {
            artists: vec![
                Artist {
                    name: "Björk".into(),
                    ..Default::default()
                },
                Artist {
                    name: "Bonobo".into(),
                    ..Default::default()
                },
            ],
        });
        let artists = source
            .search_artists(&SearchContext::new(), "b", 1)
            .await
            .expect("should succeed");
        assert_eq!(artists.len(), 1);
        assert_eq!(source.name(), "static");
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let source = StaticMusic { artists: vec![] };
        let ctx = SearchContext::new();
        ctx.cancel();
        let outcome = source.search_artists(&ctx, "x", 10).await;
        assert!(matches!(outcome, Err(SourceError::Cancelled)));
    }
}
