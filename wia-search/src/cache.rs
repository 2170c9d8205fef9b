//! In-memory TTL cache for aggregated search results.
//!
//! Two keyspaces share one TTL and one lock: artist searches keyed by
//! `(query, limit)` and event searches keyed by `(artist, city, limit)`,
//! where one of artist/city is empty depending on the call.
//!
//! Expiry is lazy. A lookup past `expires_at` reports a miss, but the stale
//! entry stays in memory until the same key is written again.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SearchError;
use crate::types::AggregatedResults;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ArtistKey {
    query: String,
    limit: usize,
}

impl ArtistKey {
    fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.trim().to_owned(),
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EventKey {
    artist_name: String,
    city: String,
    limit: usize,
}

impl EventKey {
    fn new(artist_name: &str, city: &str, limit: usize) -> Self {
        Self {
            artist_name: artist_name.trim().to_owned(),
            city: city.trim().to_owned(),
            limit,
        }
    }
}

/// A memoised aggregate and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub results: AggregatedResults,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn live(&self, now: Instant) -> Option<&AggregatedResults> {
        (now <= self.expires_at).then_some(&self.results)
    }
}

#[derive(Debug, Default)]
struct Keyspaces {
    artists: HashMap<ArtistKey, CacheEntry>,
    events: HashMap<EventKey, CacheEntry>,
}

/// TTL cache owned by an [`crate::Aggregator`].
///
/// Reads take a shared lock and may run concurrently; writes are exclusive.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<Keyspaces>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(Keyspaces::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached artist search for `(query, limit)`, if present and unexpired.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cache`] if the lock was poisoned by a panicking writer.
    pub fn get_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Option<AggregatedResults>, SearchError> {
        let key = ArtistKey::new(query, limit);
        let now = Instant::now();
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .artists
            .get(&key)
            .and_then(|entry| entry.live(now))
            .cloned())
    }

    /// Store an artist search, replacing any entry and restarting its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cache`] if the lock was poisoned by a panicking writer.
    pub fn set_artists(
        &self,
        query: &str,
        limit: usize,
        results: AggregatedResults,
    ) -> Result<(), SearchError> {
        let entry = self.entry(results);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.artists.insert(ArtistKey::new(query, limit), entry);
        Ok(())
    }

    /// Cached event search for `(artist_name, city, limit)`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cache`] if the lock was poisoned by a panicking writer.
    pub fn get_events(
        &self,
        artist_name: &str,
        city: &str,
        limit: usize,
    ) -> Result<Option<AggregatedResults>, SearchError> {
        let key = EventKey::new(artist_name, city, limit);
        let now = Instant::now();
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .events
            .get(&key)
            .and_then(|entry| entry.live(now))
            .cloned())
    }

    /// Store an event search, replacing any entry and restarting its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cache`] if the lock was poisoned by a panicking writer.
    pub fn set_events(
        &self,
        artist_name: &str,
        city: &str,
        limit: usize,
        results: AggregatedResults,
    ) -> Result<(), SearchError> {
        let entry = self.entry(results);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries
            .events
            .insert(EventKey::new(artist_name, city, limit), entry);
        Ok(())
    }

    /// Number of stored entries across both keyspaces, expired ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.artists.len() + e.events.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, results: AggregatedResults) -> CacheEntry {
        let now = Instant::now();
        CacheEntry {
            results,
            expires_at: now
                .checked_add(self.ttl)
                .unwrap_or_else(|| now + FAR_FUTURE),
        }
    }
}

/// Expiry used when `now + ttl` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 86_400);

fn poisoned() -> SearchError {
    SearchError::Cache("result cache lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn results(total: usize) -> AggregatedResults {
        AggregatedResults {
            total_results: total,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn miss_on_empty_cache() {
        let cache = ResultCache::new(Duration::from_secs(3_600));
        assert!(cache.get_artists("radiohead", 10).expect("lock").is_none());
        assert!(cache.get_events("radiohead", "", 10).expect("lock").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn artist_hit_within_ttl() {
        let cache = ResultCache::new(Duration::from_secs(3_600));
        cache.set_artists("radiohead", 10, results(3)).expect("lock");
        let hit = cache.get_artists("radiohead", 10).expect("lock");
        assert_eq!(hit.expect("should be cached").total_results, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_is_part_of_the_key() {
        let cache = ResultCache::new(Duration::from_secs(3_600));
        cache.set_artists("radiohead", 10, results(3)).expect("lock");
        assert!(cache.get_artists("radiohead", 20).expect("lock").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn keyspaces_are_independent() {
        let cache = ResultCache::new(Duration::from_secs(3_600));
        cache.set_artists("berlin", 10, results(1)).expect("lock");
        assert!(cache.get_events("", "berlin", 10).expect("lock").is_none());
        assert!(cache.get_events("berlin", "", 10).expect("lock").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn artist_and_city_event_keys_differ() {
        let cache = ResultCache::new(Duration::from_secs(3_600));
        cache.set_events("berlin", "", 10, results(1)).expect("lock");
        cache.set_events("", "berlin", 10, results(2)).expect("lock");
        let by_artist = cache.get_events("berlin", "", 10).expect("lock");
        let by_city = cache.get_events("", "berlin", 10).expect("lock");
        assert_eq!(by_artist.expect("cached").total_results, 1);
        assert_eq!(by_city.expect("cached").total_results, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_a_miss_but_not_evicted() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set_artists("portishead", 5, results(1)).expect("lock");

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(cache.get_artists("portishead", 5).expect("lock").is_none());
        assert_eq!(cache.len(), 1, "stale entry stays until overwritten");
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_extends_expiry() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set_artists("massive attack", 5, results(1)).expect("lock");
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set_artists("massive attack", 5, results(2)).expect("lock");
        tokio::time::advance(Duration::from_secs(50)).await;

        let hit = cache.get_artists("massive attack", 5).expect("lock");
        assert_eq!(hit.expect("refreshed entry").total_results, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn surrounding_whitespace_ignored() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set_artists("  tricky ", 5, results(4)).expect("lock");
        assert!(cache.get_artists("tricky", 5).expect("lock").is_some());
    }

    #[tokio::test]
    async fn unrepresentable_ttl_caches_far_into_the_future() {
        let cache = ResultCache::new(Duration::from_secs(u64::MAX));
        cache.set_artists("low", 10, results(2)).expect("lock");
        cache.set_events("", "duluth", 10, results(1)).expect("lock");
        let hit = cache.get_artists("low", 10).expect("lock");
        assert_eq!(hit.expect("cached").total_results, 2);
        assert!(cache.get_events("", "duluth", 10).expect("lock").is_some());
    }

    #[test]
    fn poisoned_lock_surfaces_as_cache_error() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60)));
        let writer = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = writer.entries.write().expect("lock");
            panic!("writer panics while holding the lock");
        })
        .join();

        let err = cache.get_artists("q", 1).unwrap_err();
        assert!(err.to_string().contains("poisoned"));
        assert!(cache.set_events("a", "", 1, results(0)).is_err());
    }
}
