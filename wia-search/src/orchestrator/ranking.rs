//! Output ordering for merged results.
//!
//! Both sorts are stable, so records that compare equal keep their merge
//! order and the output is reproducible for identical inputs.

use chrono::{DateTime, Utc};

use crate::types::{Artist, Event};

/// Most popular first.
pub fn sort_artists(artists: &mut [Artist]) {
    artists.sort_by(|a, b| b.popularity.cmp(&a.popularity));
}

/// Upcoming events (strictly after `now`) first, then past ones; each
/// partition in ascending start time.
pub fn sort_events(events: &mut [Event], now: DateTime<Utc>) {
    events.sort_by_key(|e| (e.date_time <= now, e.date_time));
}
