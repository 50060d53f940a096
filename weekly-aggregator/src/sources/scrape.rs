use crate::aggregators::time_bucket::TimeWindow;
use crate::fetcher::Fetcher;
use crate::traits::{NewsSource, SourceKind};
use crate::types::{AggregatorError, NewsItem, Result};
use crate::utils::text::collapse_whitespace;
use crate::utils::url::absolutize;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Teaser containers, most specific first. The first selector with at least
/// one match wins for the whole page.
pub const TEASER_SELECTORS: [&str; 4] = [
    "article[data-component='TeaserContainer']",
    "[data-component='TeaserContainer']",
    "article[data-teaser-name]",
    "article",
];

const LINK_SELECTOR: &str = "a[data-component='TeaserLinkContainer']";
const TITLE_SELECTOR: &str = "h2, h3, span";
const DESCRIPTION_SELECTOR: &str = "p, [class*='synopsis'], [class*='description']";
const DATE_SELECTOR: &str = "time[datetime], [datetime]";

pub const MIN_TITLE_CHARS: usize = 10;
pub const SCRAPE_CATEGORY: &str = "news";

/// A news listing page without a feed, scraped for article teasers.
pub struct ScrapeSource {
    pub name: String,
    pub url: String,
    selector: Option<String>,
    base_url: Option<String>,
    fetcher: Arc<Fetcher>,
}

impl ScrapeSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            selector: None,
            base_url: None,
            fetcher,
        }
    }

    /// Container selector tried before the built-in cascade.
    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }

    /// Origin used for relative links instead of the page URL.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    fn link_base(&self) -> Result<Url> {
        let base = self.base_url.as_deref().unwrap_or(&self.url);
        Ok(Url::parse(base)?)
    }
}

#[async_trait]
impl NewsSource for ScrapeSource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    async fn pull(&self, window: &TimeWindow) -> Result<Vec<NewsItem>> {
        info!("Scraping {} ({})", self.name, self.url);
        let base = self.link_base()?;

        let headers = self.fetcher.browser_headers()?;
        let response = self.fetcher.get(&self.url, headers).await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Scrape of {} returned HTTP {}, skipping", self.url, status);
            return Ok(Vec::new());
        }
        let html = self.fetcher.read_text(response).await?;

        let items = extract_teasers(&html, &base, self.selector.as_deref(), &self.name, window)?;
        info!("Scraped {} items from {}", items.len(), self.name);
        Ok(items)
    }
}

/// Pull news items out of a listing page.
///
/// Teasers without a parseable date, dated before `window.start`, without a
/// link, or with a title shorter than [`MIN_TITLE_CHARS`] are dropped.
pub fn extract_teasers(
    html: &str,
    base: &Url,
    selector_hint: Option<&str>,
    source: &str,
    window: &TimeWindow,
) -> Result<Vec<NewsItem>> {
    let document = Html::parse_document(html);

    let link_sel = parse_selector(LINK_SELECTOR)?;
    let any_link_sel = parse_selector("a")?;
    let title_sel = parse_selector(TITLE_SELECTOR)?;
    let description_sel = parse_selector(DESCRIPTION_SELECTOR)?;
    let date_sel = parse_selector(DATE_SELECTOR)?;

    let containers = select_containers(&document, selector_hint)?;
    debug!("{}: {} teaser candidates", source, containers.len());

    let mut items = Vec::new();
    for container in containers {
        let Some(link) = container
            .select(&link_sel)
            .next()
            .or_else(|| container.select(&any_link_sel).next())
        else {
            continue;
        };

        let raw_title = link
            .select(&title_sel)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(link));
        let title = collapse_whitespace(&raw_title);
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }

        let Some(url) = link.value().attr("href").and_then(|href| absolutize(base, href)) else {
            continue;
        };

        let Some(published_at) = container
            .select(&date_sel)
            .next()
            .and_then(|e| e.value().attr("datetime"))
            .and_then(parse_teaser_datetime)
        else {
            continue;
        };
        if published_at < window.start {
            continue;
        }

        let description = container
            .select(&description_sel)
            .next()
            .map(|e| collapse_whitespace(&element_text(e)))
            .unwrap_or_default();

        items.push(NewsItem {
            title,
            url,
            source: source.to_string(),
            description,
            published_at,
            category: SCRAPE_CATEGORY.to_string(),
        });
    }
    Ok(items)
}

fn select_containers<'a>(document: &'a Html, hint: Option<&str>) -> Result<Vec<ElementRef<'a>>> {
    if let Some(hint) = hint {
        match Selector::parse(hint) {
            Ok(selector) => {
                let found: Vec<_> = document.select(&selector).collect();
                if !found.is_empty() {
                    return Ok(found);
                }
            }
            Err(e) => warn!("Ignoring invalid selector {:?}: {}", hint, e),
        }
    }

    for candidate in TEASER_SELECTORS {
        let selector = parse_selector(candidate)?;
        let found: Vec<_> = document.select(&selector).collect();
        if !found.is_empty() {
            debug!("Using teaser selector {}", candidate);
            return Ok(found);
        }
    }
    Ok(Vec::new())
}

/// Parse a teaser timestamp: millisecond UTC, then RFC 3339, then second UTC.
pub fn parse_teaser_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3fZ")
        .map(|n| n.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc)))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ").map(|n| n.and_utc()))
        .ok()
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AggregatorError::Parse(format!("invalid selector {:?}: {}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        TimeWindow::for_iso_week(&Utc, 2024, 2).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.heise.de/thema/Kubernetes").unwrap()
    }

    #[test]
    fn parses_all_teaser_date_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap();
        assert_eq!(parse_teaser_datetime("2024-01-10T08:30:00.000Z"), Some(expected));
        assert_eq!(parse_teaser_datetime("2024-01-10T09:30:00+01:00"), Some(expected));
        assert_eq!(parse_teaser_datetime("2024-01-10T08:30:00Z"), Some(expected));
        assert_eq!(parse_teaser_datetime("10.01.2024"), None);
    }

    #[test]
    fn title_length_threshold_is_ten_characters() {
        let html = r#"
            <article data-component="TeaserContainer">
              <a data-component="TeaserLinkContainer" href="/news/a.html"><h3>123456789</h3></a>
              <time datetime="2024-01-10T08:30:00.000Z"></time>
            </article>
            <article data-component="TeaserContainer">
              <a data-component="TeaserLinkContainer" href="/news/b.html"><h3>1234567890</h3></a>
              <time datetime="2024-01-10T08:30:00.000Z"></time>
            </article>"#;
        let items = extract_teasers(html, &base(), None, "heise", &window()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "1234567890");
        assert_eq!(items[0].url, "https://www.heise.de/news/b.html");
    }

    #[test]
    fn falls_back_through_the_selector_cascade() {
        let html = r#"
            <div data-component="TeaserContainer">
              <a href="https://www.heise.de/news/cascade.html">
                <span>  Kubernetes   1.30
                  ships sidecars </span>
              </a>
              <p class="a-synopsis"> Native sidecar containers are stable. </p>
              <span datetime="2024-01-11T12:00:00Z"></span>
            </div>"#;
        let items = extract_teasers(html, &base(), None, "heise", &window()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kubernetes 1.30 ships sidecars");
        assert_eq!(items[0].description, "Native sidecar containers are stable.");
        assert_eq!(items[0].category, "news");
    }

    #[test]
    fn drops_undated_and_stale_teasers() {
        let html = r#"
            <article>
              <a href="/news/undated.html"><h2>An undated teaser title</h2></a>
            </article>
            <article>
              <a href="/news/stale.html"><h2>A teaser from last year</h2></a>
              <time datetime="2023-12-20T08:00:00Z"></time>
            </article>
            <article>
              <a href="/news/bad-date.html"><h2>A teaser with garbage date</h2></a>
              <time datetime="yesterday"></time>
            </article>"#;
        let items = extract_teasers(html, &base(), None, "heise", &window()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn selector_hint_takes_precedence() {
        let html = r#"
            <article>
              <a href="/news/generic.html"><h2>Generic article teaser</h2></a>
              <time datetime="2024-01-10T08:00:00Z"></time>
            </article>
            <li class="story">
              <a href="/news/hinted.html"><h2>Hinted story teaser</h2></a>
              <time datetime="2024-01-10T08:00:00Z"></time>
            </li>"#;
        let hinted = extract_teasers(html, &base(), Some("li.story"), "heise", &window()).unwrap();
        assert_eq!(hinted.len(), 1);
        assert_eq!(hinted[0].title, "Hinted story teaser");

        let invalid_hint = extract_teasers(html, &base(), Some("li[[["), "heise", &window()).unwrap();
        assert_eq!(invalid_hint[0].title, "Generic article teaser");
    }
}
