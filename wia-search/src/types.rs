//! Core types: artists, events, aggregate results and source metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An artist as reported by a music source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    /// Source-specific identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Provider identifiers keyed by provider name (e.g. `spotify`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    /// Provider popularity on a 0–100 scale. Higher sorts first.
    #[serde(default)]
    pub popularity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Where an event takes place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub country: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

/// A live event (concert, festival slot, club night).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub artist_id: String,
    pub artist_name: String,
    #[serde(default)]
    pub title: String,
    /// Start time of the event.
    #[serde(rename = "datetime")]
    pub date_time: DateTime<Utc>,
    pub venue: Venue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_sale_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
    /// How long the producing source considers this record fresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_until: Option<DateTime<Utc>>,
}

/// The capability a registered source provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Artist search (`MusicSource`).
    Music,
    /// Event search by artist or location (`EventSource`).
    Events,
    /// HTML scraper producing events (`Scraper`).
    Scraper,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Events => "events",
            Self::Scraper => "scraper",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Health of a source as seen by the aggregator's circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Healthy, no failures since the last success.
    Active,
    /// Still dispatched, but failing recently.
    Degraded,
    /// Tripped; skipped while the breaker is enabled.
    Unavailable,
    /// Cooldown elapsed; the next call is a probe.
    Recovering,
}

/// Entry of [`crate::Aggregator::source_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub status: SourceStatus,
}

/// The merged outcome of one federated search.
///
/// Also the payload stored in the result cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResults {
    pub artists: Vec<Artist>,
    pub events: Vec<Event>,
    /// Raw item count per successful source, recorded before deduplication.
    pub source_stats: BTreeMap<String, usize>,
    /// Length of the returned `artists` or `events` list.
    pub total_results: usize,
    /// Wall-clock time spent serving the call, serialised as nanoseconds.
    #[serde(with = "duration_nanos")]
    pub search_time: Duration,
    /// `"<source>: <cause>"` for every source that failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Serialise a [`Duration`] as an integer count of nanoseconds.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
