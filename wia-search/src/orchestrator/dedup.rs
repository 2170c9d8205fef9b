//! Collapse records that describe the same artist or event.
//!
//! Records are grouped by a normalised key. The output keeps one record per
//! key, in the position of the key's first occurrence, so the result only
//! depends on input order. A lookup map records where each key already sits
//! in the output list.
//!
//! When two records collide the winner absorbs fields it is missing from the
//! loser, so merging never throws away an external id or ticket link.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::types::{Artist, Event};

/// Artist name lowercased with spaces, periods and hyphens removed.
pub fn artist_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Venue name lowercased with spaces removed.
pub fn venue_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// `<artist key>_<venue key>_<YYYYMMDD>`.
pub fn event_key(event: &Event) -> String {
    format!(
        "{}_{}_{}",
        artist_key(&event.artist_name),
        venue_key(&event.venue.name),
        event.date_time.format("%Y%m%d")
    )
}

/// Deduplicate artists by [`artist_key`].
///
/// The most popular record wins; on equal popularity the earlier one is kept.
pub fn dedup_artists(artists: Vec<Artist>) -> Vec<Artist> {
    dedup_by(artists, |a| artist_key(&a.name), |kept, other| {
        if other.popularity > kept.popularity {
            let loser = std::mem::replace(kept, other);
            absorb_artist(kept, loser);
        } else {
            absorb_artist(kept, other);
        }
    })
}

/// Deduplicate events by [`event_key`]. The earlier record always wins.
pub fn dedup_events(events: Vec<Event>) -> Vec<Event> {
    dedup_by(events, event_key, absorb_event)
}

fn dedup_by<T, K, M>(items: Vec<T>, key: K, mut merge: M) -> Vec<T>
where
    K: Fn(&T) -> String,
    M: FnMut(&mut T, T),
{
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    let mut position: HashMap<String, usize> = HashMap::with_capacity(items.len());

    for item in items {
        match position.entry(key(&item)) {
            Entry::Occupied(slot) => merge(&mut kept[*slot.get()], item),
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(item);
            }
        }
    }

    kept
}

fn absorb_artist(winner: &mut Artist, loser: Artist) {
    for (provider, id) in loser.external_ids {
        winner.external_ids.entry(provider).or_insert(id);
    }
    if winner.genres.is_empty() {
        winner.genres = loser.genres;
    }
    if winner.image_url.is_none() {
        winner.image_url = loser.image_url;
    }
}

fn absorb_event(winner: &mut Event, loser: Event) {
    for (provider, id) in loser.external_ids {
        winner.external_ids.entry(provider).or_insert(id);
    }
    if winner.ticket_url.is_none() {
        winner.ticket_url = loser.ticket_url;
    }
    if winner.ticket_status.is_none() {
        winner.ticket_status = loser.ticket_status;
    }
    if winner.on_sale_date.is_none() {
        winner.on_sale_date = loser.on_sale_date;
    }
}
