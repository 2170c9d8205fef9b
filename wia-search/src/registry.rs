//! Immutable snapshot of the sources an aggregator fans out to.
//!
//! Built once with [`SourceRegistryBuilder`] and handed to
//! [`crate::Aggregator::new`]. Registration order is kept and is the order
//! in which per-source results are merged, so identical inputs always
//! produce identical output.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::SearchError;
use crate::source::{EventSource, MusicSource, Scraper};
use crate::types::SourceKind;

#[derive(Clone, Default)]
pub struct SourceRegistry {
    music: Vec<Arc<dyn MusicSource>>,
    events: Vec<Arc<dyn EventSource>>,
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl SourceRegistry {
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    pub fn music_sources(&self) -> &[Arc<dyn MusicSource>] {
        &self.music
    }

    pub fn event_sources(&self) -> &[Arc<dyn EventSource>] {
        &self.events
    }

    pub fn scrapers(&self) -> &[Arc<dyn Scraper>] {
        &self.scrapers
    }

    /// Every registered source name with its capability, in registration order.
    pub fn describe(&self) -> Vec<(String, SourceKind)> {
        let music = self
            .music
            .iter()
            .map(|s| (s.name().to_owned(), SourceKind::Music));
        let events = self
            .events
            .iter()
            .map(|s| (s.name().to_owned(), SourceKind::Events));
        let scrapers = self
            .scrapers
            .iter()
            .map(|s| (s.name().to_owned(), SourceKind::Scraper));
        music.chain(events).chain(scrapers).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.music.is_empty() && self.events.is_empty() && self.scrapers.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}

#[derive(Default)]
pub struct SourceRegistryBuilder {
    registry: SourceRegistry,
}

impl SourceRegistryBuilder {
    pub fn music(mut self, source: Arc<dyn MusicSource>) -> Self {
        self.registry.music.push(source);
        self
    }

    pub fn event(mut self, source: Arc<dyn EventSource>) -> Self {
        self.registry.events.push(source);
        self
    }

    pub fn scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.registry.scrapers.push(scraper);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if a name is empty or appears twice
    /// among the sources of one search (music sources, or event sources and
    /// scrapers together).
    pub fn build(self) -> Result<SourceRegistry, SearchError> {
        let registry = self.registry;
        let described = registry.describe();
        let groups: [&[SourceKind]; 2] = [
            &[SourceKind::Music],
            &[SourceKind::Events, SourceKind::Scraper],
        ];
        for group in groups {
            let mut seen = HashSet::new();
            for (name, kind) in described.iter().filter(|(_, k)| group.contains(k)) {
                if name.is_empty() {
                    return Err(SearchError::Config(format!(
                        "{kind} source registered with an empty name"
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(SearchError::Config(format!(
                        "duplicate {kind} source name: {name}"
                    )));
                }
            }
        }
        Ok(registry)
    }
}
