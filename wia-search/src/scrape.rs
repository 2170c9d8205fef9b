//! Shared helpers for HTML scrapers.
//!
//! Scrapers produce [`ScrapedEvent`]s, a loose record straight off a
//! listing page. They become canonical [`Event`]s through `From` before the
//! aggregator merges them with API-backed sources.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SourceError;
use crate::types::{Event, Venue};

/// How long a scraped event is considered fresh.
const SCRAPED_FRESHNESS_HOURS: i64 = 24;

/// Date-only layouts tried in order. Day-first wins for ambiguous numerics.
const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
];

/// An event as lifted from a scraped page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedEvent {
    pub title: String,
    pub artist_name: String,
    pub date: Option<DateTime<Utc>>,
    pub venue_name: String,
    pub city: String,
    pub country: String,
    /// Link to the event page.
    pub url: String,
    pub description: String,
    pub price: String,
    pub tags: Vec<String>,
}

impl From<ScrapedEvent> for Event {
    fn from(scraped: ScrapedEvent) -> Self {
        let now = Utc::now();
        let date_time = scraped.date.unwrap_or(now);
        let slug = slugify(&scraped.artist_name);

        Event {
            id: format!("scraped_{slug}_{}", date_time.format("%Y%m%d")),
            artist_id: format!("scraped_artist_{slug}"),
            artist_name: scraped.artist_name,
            title: scraped.title,
            date_time,
            venue: Venue {
                name: scraped.venue_name,
                city: scraped.city,
                country: scraped.country,
                ..Default::default()
            },
            ticket_url: (!scraped.url.is_empty()).then_some(scraped.url),
            ticket_status: None,
            on_sale_date: None,
            external_ids: Default::default(),
            cached_until: Some(now + ChronoDuration::hours(SCRAPED_FRESHNESS_HOURS)),
        }
    }
}

fn slugify(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Collapse runs of whitespace (including newlines and tabs) to single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a date as it typically appears on listing pages.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS`, and the date-only
/// layouts in [`DATE_LAYOUTS`] (interpreted as midnight UTC). Returns
/// `None` when nothing matches.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = clean_text(raw);
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    DATE_LAYOUTS.iter().find_map(|layout| {
        NaiveDate::parse_from_str(&raw, layout)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Resolve a possibly relative link found on `base`.
///
/// # Errors
///
/// Returns [`SourceError::Decode`] if either URL is malformed.
pub fn resolve_url(base: &str, relative: &str) -> Result<String, SourceError> {
    let base = Url::parse(base).map_err(|e| SourceError::Decode(format!("invalid base URL: {e}")))?;
    let joined = base
        .join(relative)
        .map_err(|e| SourceError::Decode(format!("invalid relative URL: {e}")))?;
    Ok(joined.into())
}

/// Cleaned text of every element matching `selector`, empty matches dropped.
///
/// # Errors
///
/// Returns [`SourceError::Decode`] if `selector` is not valid CSS.
pub fn select_text(html: &str, selector: &str) -> Result<Vec<String>, SourceError> {
    let selector = Selector::parse(selector)
        .map_err(|e| SourceError::Decode(format!("invalid selector {selector:?}: {e:?}")))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect())
}

/// `href` of every element matching `selector`, resolved against `base`.
///
/// # Errors
///
/// Returns [`SourceError::Decode`] if `selector` is not valid CSS or `base`
/// is not a valid URL. Individual unresolvable links are skipped.
pub fn select_links(html: &str, selector: &str, base: &str) -> Result<Vec<String>, SourceError> {
    let parsed = Selector::parse(selector)
        .map_err(|e| SourceError::Decode(format!("invalid selector {selector:?}: {e:?}")))?;
    Url::parse(base).map_err(|e| SourceError::Decode(format!("invalid base URL: {e}")))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&parsed)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_url(base, href).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Live at\n\tthe   Roundhouse  "), "Live at the Roundhouse");
        assert_eq!(clean_text("\n\n"), "");
    }

    #[test]
    fn parse_iso_date() {
        let date = parse_date("2031-09-14").expect("iso");
        assert_eq!((date.year(), date.month(), date.day()), (2031, 9, 14));
        assert_eq!(date.hour(), 0);
    }

    #[test]
    fn parse_rfc3339_converts_to_utc() {
        let date = parse_date("2031-09-14T21:30:00+02:00").expect("rfc3339");
        assert_eq!(date.hour(), 19);
    }

    #[test]
    fn parse_naive_timestamp() {
        let date = parse_date("2031-09-14T21:30:00").expect("naive");
        assert_eq!(date.hour(), 21);
    }

    #[test]
    fn ambiguous_numeric_date_is_day_first() {
        let date = parse_date("02/01/2031").expect("numeric");
        assert_eq!((date.month(), date.day()), (1, 2));
    }

    #[test]
    fn month_first_used_when_day_first_impossible() {
        let date = parse_date("12/25/2031").expect("numeric");
        assert_eq!((date.month(), date.day()), (12, 25));
    }

    #[test]
    fn parse_long_form_dates() {
        for raw in ["January 2, 2031", "Jan 2, 2031", "2 January 2031", "2 Jan 2031"] {
            let date = parse_date(raw).unwrap_or_else(|| panic!("should parse {raw}"));
            assert_eq!((date.month(), date.day()), (1, 2), "{raw}");
        }
    }

    #[test]
    fn unparseable_date_is_none() {
        assert!(parse_date("next thursday").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn scraped_event_converts_to_event() {
        let scraped = ScrapedEvent {
            title: "Warehouse night".into(),
            artist_name: "Four Tet".into(),
            date: Some(Utc.with_ymd_and_hms(2031, 3, 7, 23, 0, 0).unwrap()),
            venue_name: "Printworks".into(),
            city: "London".into(),
            country: "GB".into(),
            url: "https://ra.co/events/1".into(),
            ..Default::default()
        };

        let event = Event::from(scraped);
        assert_eq!(event.id, "scraped_four_tet_20310307");
        assert_eq!(event.artist_id, "scraped_artist_four_tet");
        assert_eq!(event.venue.name, "Printworks");
        assert_eq!(event.venue.city, "London");
        assert_eq!(event.ticket_url.as_deref(), Some("https://ra.co/events/1"));
        assert!(event.cached_until.expect("freshness set") > Utc::now());
    }

    #[test]
    fn scraped_event_without_link_has_no_ticket_url() {
        let event = Event::from(ScrapedEvent {
            artist_name: "Caribou".into(),
            date: Some(Utc::now()),
            ..Default::default()
        });
        assert!(event.ticket_url.is_none());
    }

    #[test]
    fn resolve_relative_link() {
        let url = resolve_url("https://ra.co/events/de/berlin", "/events/123").expect("valid");
        assert_eq!(url, "https://ra.co/events/123");
    }

    #[test]
    fn resolve_rejects_bad_base() {
        assert!(resolve_url("not a url", "/x").is_err());
    }

    #[test]
    fn select_text_extracts_clean_strings() {
        let html = r#"
            <ul>
              <li class="event"><span class="artist">  Bicep </span></li>
              <li class="event"><span class="artist">Jamie
                 xx</span></li>
              <li class="event"><span class="artist">   </span></li>
            </ul>"#;
        let artists = select_text(html, ".event .artist").expect("valid selector");
        assert_eq!(artists, vec!["Bicep", "Jamie xx"]);
    }

    #[test]
    fn select_text_rejects_bad_selector() {
        assert!(select_text("<p></p>", "<<<").is_err());
    }

    #[test]
    fn select_links_resolves_hrefs() {
        let html = r#"<a class="e" href="/events/1">1</a><a class="e" href="https://other.example/2">2</a><a class="e">no href</a>"#;
        let links = select_links(html, "a.e", "https://bandcamp.com/").expect("valid");
        assert_eq!(
            links,
            vec!["https://bandcamp.com/events/1", "https://other.example/2"]
        );
    }
}
