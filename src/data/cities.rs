//! State and city directory scraper
//!
//! Crawls a two-page directory: an index page whose first `tab` link leads to
//! the list of states, and the state page itself, where each `<h2 class="h1">`
//! heading names a state and the `<ul class="topic-list">` at the same
//! position lists its cities. Both pages are fetched through the mediator.
//!
//! The extraction is tied to that markup. If the site changes, the index step
//! fails with [`ScrapeError::MissingStateLink`] and the state step returns an
//! empty or partial listing.

use html_escape::decode_html_entities;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

use super::{CityListing, StateCities};
use crate::cache::{FetchError, FetchMediator, Transport};

/// Index page linking to the state and city listing
pub const DEFAULT_INDEX_URL: &str =
    "https://www.britannica.com/topic/list-of-cities-and-towns-in-the-United-States-2023068/additional-info";

/// Origin used to resolve relative links on the index page
pub const DEFAULT_SITE_ORIGIN: &str = "https://www.britannica.com";

/// Errors that can occur when scraping the directory
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A page could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The index page has no `tab` link to the state listing
    #[error("No state listing link found on {0}")]
    MissingStateLink(String),
}

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid anchor pattern"));

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2\b([^>]*)>(.*?)</h2\s*>").expect("valid heading pattern"));

static LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<ul\b([^>]*)>(.*?)</ul\s*>").expect("valid list pattern"));

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li\s*>").expect("valid item pattern"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute pattern")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"));

/// Scrapes the state directory through a fetch mediator
#[derive(Debug, Clone)]
pub struct CityDirectory {
    index_url: String,
    origin: String,
}

impl Default for CityDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_URL, DEFAULT_SITE_ORIGIN)
    }
}

impl CityDirectory {
    /// Creates a scraper for a custom index page and origin
    pub fn new(index_url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            index_url: index_url.into(),
            origin: origin.into(),
        }
    }

    /// Fetches both directory pages and returns every state with its cities
    pub async fn fetch_state_cities<T: Transport>(
        &self,
        mediator: &mut FetchMediator<T>,
    ) -> Result<StateCities, ScrapeError> {
        let index_html = mediator.fetch_text_with_cache(&self.index_url).await?;
        let state_url = state_page_url(&index_html, &self.origin)
            .ok_or_else(|| ScrapeError::MissingStateLink(self.index_url.clone()))?;
        debug!(url = %state_url, "Resolved state listing page");

        let state_html = mediator.fetch_text_with_cache(&state_url).await?;
        let states = parse_state_cities(&state_html);
        info!(states = states.len(), "Parsed state directory");
        Ok(states)
    }
}

/// Finds the first `<a class="tab">` link and resolves it against `origin`
pub fn state_page_url(index_html: &str, origin: &str) -> Option<String> {
    ANCHOR_RE
        .captures_iter(index_html)
        .filter(|caps| has_class(&caps[1], "tab"))
        .find_map(|caps| attribute(&caps[1], "href"))
        .map(|href| resolve(origin, &href))
}

/// Pairs state headings with city lists by position
///
/// A heading without an `md-crosslink` anchor falls back to its own text. A
/// list item without an anchor contributes its plain text.
pub fn parse_state_cities(html: &str) -> StateCities {
    let states = HEADING_RE
        .captures_iter(html)
        .filter(|caps| has_class(&caps[1], "h1"))
        .map(|caps| {
            let inner = &caps[2];
            ANCHOR_RE
                .captures_iter(inner)
                .find(|a| has_class(&a[1], "md-crosslink"))
                .map(|a| text_of(&a[2]))
                .unwrap_or_else(|| text_of(inner))
                .to_lowercase()
        });

    let city_lists = LIST_RE
        .captures_iter(html)
        .filter(|caps| has_class(&caps[1], "topic-list"))
        .map(|caps| {
            ITEM_RE
                .captures_iter(&caps[2])
                .map(|item| {
                    let inner = &item[1];
                    ANCHOR_RE
                        .captures(inner)
                        .map(|a| text_of(&a[2]))
                        .unwrap_or_else(|| text_of(inner))
                })
                .filter(|city| !city.is_empty())
                .collect::<Vec<_>>()
        });

    let listings = states
        .zip(city_lists)
        .filter(|(state, _)| !state.is_empty())
        .map(|(state, cities)| CityListing { state, cities })
        .collect();

    StateCities::new(listings)
}

/// Value of attribute `name` in a tag's attribute text
fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(attrs)
        .find(|caps| caps[1].eq_ignore_ascii_case(name))
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| decode_html_entities(m.as_str()).into_owned())
}

/// Returns true if the tag's `class` attribute lists `class`
fn has_class(attrs: &str, class: &str) -> bool {
    attribute(attrs, "class")
        .map(|value| value.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// Visible text of a fragment: tags removed, entities decoded, trimmed
fn text_of(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    let decoded = decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Joins a relative link to `origin`; absolute links pass through
fn resolve(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mediator::tests::FakeTransport;
    use crate::cache::CacheStore;
    use tempfile::TempDir;

    const INDEX_HTML: &str = r#"
        <nav>
          <a class="nav" href="/other">Other</a>
          <a class="tab active" href="/topic/list-of-cities-and-towns-in-the-United-States-2023068">Cities</a>
          <a class="tab" href="/second">Second</a>
        </nav>"#;

    const STATE_HTML: &str = r#"
        <section>
          <h2 class="h1"><a class="md-crosslink" href="/place/Alabama-state">Alabama</a></h2>
          <ul class="topic-list">
            <li><div><a href="/place/Birmingham">Birmingham</a></div></li>
            <li><div><a href="/place/Mobile">Mobile</a></div></li>
          </ul>
          <h2 class="h1"><a class="md-crosslink" href="/place/California">California</a></h2>
          <ul class="topic-list">
            <li><a href="/place/Los-Angeles">Los Angeles</a></li>
            <li>Napa</li>
            <li><a href="/place/San-Luis-Obispo">San Luis Obispo</a></li>
          </ul>
          <h2 class="h1"><a class="md-crosslink" href="/place/Michigan">Michigan</a></h2>
          <ul class="topic-list">
            <li><a href="/place/Ann-Arbor">Ann Arbor</a></li>
            <li><a href="/place/Coeur">Sault Ste.&nbsp;Marie</a></li>
          </ul>
        </section>"#;

    #[test]
    fn test_state_page_url_resolves_first_tab() {
        let url = state_page_url(INDEX_HTML, DEFAULT_SITE_ORIGIN).unwrap();
        assert_eq!(
            url,
            "https://www.britannica.com/topic/list-of-cities-and-towns-in-the-United-States-2023068"
        );
    }

    #[test]
    fn test_state_page_url_keeps_absolute_link() {
        let html = r#"<a href="https://other.example.com/states" class="tab">States</a>"#;
        assert_eq!(
            state_page_url(html, DEFAULT_SITE_ORIGIN).as_deref(),
            Some("https://other.example.com/states")
        );
    }

    #[test]
    fn test_state_page_url_missing() {
        assert!(state_page_url("<a class=\"nav\" href=\"/x\">x</a>", DEFAULT_SITE_ORIGIN).is_none());
        assert!(state_page_url("", DEFAULT_SITE_ORIGIN).is_none());
    }

    #[test]
    fn test_parse_state_cities() {
        let states = parse_state_cities(STATE_HTML);

        let names: Vec<&str> = states.states().collect();
        assert_eq!(names, vec!["alabama", "california", "michigan"]);
        assert_eq!(
            states.cities("alabama").unwrap(),
            &["Birmingham".to_string(), "Mobile".to_string()]
        );
    }

    #[test]
    fn test_list_item_without_anchor_uses_text() {
        let states = parse_state_cities(STATE_HTML);
        let california = states.cities("California").unwrap();
        assert_eq!(california, &["Los Angeles", "Napa", "San Luis Obispo"]);
    }

    #[test]
    fn test_entities_are_decoded() {
        let states = parse_state_cities(STATE_HTML);
        let michigan = states.cities("michigan").unwrap();
        assert_eq!(michigan[1], "Sault Ste. Marie");
    }

    #[test]
    fn test_named_and_numeric_entities_are_decoded() {
        let html = r#"<h2 class="h1">New Mexico</h2>
            <ul class="topic-list">
              <li><a>Espa&ntilde;ola</a></li>
              <li><a>Coeur d&#8217;Alene</a></li>
              <li><a>Ca&#241;on City</a></li>
              <li><a>Ca&#xF1;on</a></li>
            </ul>"#;
        let states = parse_state_cities(html);
        assert_eq!(
            states.cities("new mexico").unwrap(),
            &["Española", "Coeur d\u{2019}Alene", "Cañon City", "Cañon"]
        );
    }

    #[test]
    fn test_changed_markup_yields_empty_listing() {
        let html = "<div><h3>Alabama</h3><ol><li>Birmingham</li></ol></div>";
        assert!(parse_state_cities(html).is_empty());
    }

    #[test]
    fn test_heading_without_crosslink_uses_heading_text() {
        let html = r#"<h2 class="h1">Ohio</h2><ul class="topic-list"><li>Columbus</li></ul>"#;
        let states = parse_state_cities(html);
        assert_eq!(states.cities("ohio").unwrap(), &["Columbus"]);
    }

    #[test]
    fn test_extra_headings_are_ignored() {
        let html = r#"
            <h2 class="h1"><a class="md-crosslink">Utah</a></h2>
            <ul class="topic-list"><li>Provo</li></ul>
            <h2 class="h1"><a class="md-crosslink">Vermont</a></h2>"#;
        let states = parse_state_cities(html);
        assert_eq!(states.len(), 1);
        assert!(!states.contains_state("vermont"));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("https://a.com/", "/b"), "https://a.com/b");
        assert_eq!(resolve("https://a.com", "b"), "https://a.com/b");
        assert_eq!(resolve("https://a.com", "http://c.com/d"), "http://c.com/d");
    }

    #[tokio::test]
    async fn test_fetch_state_cities_through_cache() {
        let mut transport = FakeTransport::default();
        transport
            .pages
            .insert(DEFAULT_INDEX_URL.to_string(), INDEX_HTML.to_string());
        transport.pages.insert(
            "https://www.britannica.com/topic/list-of-cities-and-towns-in-the-United-States-2023068"
                .to_string(),
            STATE_HTML.to_string(),
        );
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CacheStore::load(temp_dir.path().join("cache.json"));
        let mut mediator = FetchMediator::new(store, transport.clone());
        let directory = CityDirectory::default();

        let first = directory.fetch_state_cities(&mut mediator).await.unwrap();
        let second = directory.fetch_state_cities(&mut mediator).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(transport.calls(), 2, "Each page should be fetched once");
    }

    #[tokio::test]
    async fn test_fetch_state_cities_missing_link() {
        let mut transport = FakeTransport::default();
        transport
            .pages
            .insert(DEFAULT_INDEX_URL.to_string(), "<html></html>".to_string());
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CacheStore::load(temp_dir.path().join("cache.json"));
        let mut mediator = FetchMediator::new(store, transport);

        let result = CityDirectory::default().fetch_state_cities(&mut mediator).await;

        assert!(matches!(result, Err(ScrapeError::MissingStateLink(_))));
    }
}
