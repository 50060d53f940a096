use crate::aggregators::time_bucket::TimeWindow;
use crate::config::Repository;
use crate::fetcher::{ensure_success, header_value, Fetcher};
use crate::types::{AggregatorError, RateLimitAction, Release, Result};
use crate::utils::text::sanitize_json;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const PER_PAGE: usize = 100;
pub const DEFAULT_MAX_PAGES: u32 = 10;
pub const DEFAULT_REPO_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

/// Release listing for tracked repositories via the GitHub REST API.
pub struct GithubReleases {
    api_base: String,
    token: Option<String>,
    max_pages: u32,
    repo_delay: Duration,
    fetcher: Arc<Fetcher>,
}

impl GithubReleases {
    pub fn new(fetcher: Arc<Fetcher>, token: Option<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            max_pages: DEFAULT_MAX_PAGES,
            repo_delay: DEFAULT_REPO_DELAY,
            fetcher,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_repo_delay(mut self, delay: Duration) -> Self {
        self.repo_delay = delay;
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        if let Some(token) = &self.token {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }
        Ok(headers)
    }

    /// Published, non-draft releases of `owner/repo` that fall inside `window`.
    ///
    /// Pages until a short or empty page, a page whose dated releases all
    /// predate the window, or the page cap.
    pub async fn fetch(&self, owner: &str, repo: &str, category: &str, window: &TimeWindow) -> Result<Vec<Release>> {
        let base = self.api_base.trim_end_matches('/');
        let mut releases = Vec::new();

        for page in 1..=self.max_pages {
            let url = format!(
                "{}/repos/{}/{}/releases?per_page={}&page={}",
                base, owner, repo, PER_PAGE, page
            );
            let response = self.fetcher.get(&url, self.headers()?).await?;
            if let Some(limited) = rate_limit_error(response.status(), response.headers()) {
                return Err(limited);
            }
            let response = ensure_success(response)?;
            let body = self.fetcher.read_bytes(response).await?;
            let page_values: Vec<serde_json::Value> = serde_json::from_str(&sanitize_json(&body))?;

            let listed_count = page_values.len();
            let listed = decode_page(page_values, owner, repo);
            let exhausted = page_predates_window(&listed, window);
            debug!("{}/{} page {}: {} releases", owner, repo, page, listed_count);

            releases.extend(
                listed
                    .into_iter()
                    .filter_map(|r| to_release(r, owner, repo, category, window)),
            );

            if listed_count < PER_PAGE || exhausted {
                break;
            }
        }
        Ok(releases)
    }

    /// Fetch every repository in turn, pausing between them.
    ///
    /// A failing repository is logged and skipped. On a rate-limit signal
    /// `on_rate_limit` decides whether to keep going. Cancellation aborts.
    pub async fn fetch_all(
        &self,
        repos: &[Repository],
        window: &TimeWindow,
        on_rate_limit: RateLimitAction,
    ) -> Result<Vec<Release>> {
        info!("Fetching releases from {} to {}", window.start.format("%Y-%m-%d"), window.end.format("%Y-%m-%d"));
        let mut all = Vec::new();

        for (i, repo) in repos.iter().enumerate() {
            if i > 0 {
                self.fetcher.sleep(self.repo_delay).await?;
            }
            info!("[{}/{}] Fetching {}", i + 1, repos.len(), repo.slug());

            match self.fetch(&repo.owner, &repo.repo, &repo.category, window).await {
                Ok(found) => {
                    for r in &found {
                        debug!("  - {} ({})", r.tag_name, r.published_at.format("%Y-%m-%d"));
                    }
                    if !found.is_empty() {
                        info!("  Found {} releases", found.len());
                    }
                    all.extend(found);
                }
                Err(AggregatorError::Cancelled) => return Err(AggregatorError::Cancelled),
                Err(e @ AggregatorError::RateLimited { .. }) => {
                    warn!("{}: {}", repo.slug(), e);
                    if on_rate_limit == RateLimitAction::Abort {
                        warn!("Stopping release collection after rate limit, keeping {} releases", all.len());
                        break;
                    }
                }
                Err(e) => warn!("{}: {}", repo.slug(), e),
            }
        }
        Ok(all)
    }
}

/// Decode each listed release on its own; a malformed entry is logged and
/// skipped without losing the rest of the page.
fn decode_page(values: Vec<serde_json::Value>, owner: &str, repo: &str) -> Vec<ApiRelease> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<ApiRelease>(value) {
            Ok(release) => Some(release),
            Err(e) => {
                warn!("{}/{}: skipping malformed release entry: {}", owner, repo, e);
                None
            }
        })
        .collect()
}

fn to_release(r: ApiRelease, owner: &str, repo: &str, category: &str, window: &TimeWindow) -> Option<Release> {
    if r.draft {
        return None;
    }
    let published_at = r.published_at?;
    if !window.contains(published_at) {
        return None;
    }
    let name = match r.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => r.tag_name.clone(),
    };
    Some(Release {
        repo_owner: owner.to_string(),
        repo_name: repo.to_string(),
        tag_name: r.tag_name,
        name,
        body: r.body.unwrap_or_default(),
        url: r.html_url,
        published_at,
        category: category.to_string(),
        is_prerelease: r.prerelease,
    })
}

/// True when the page has dated releases and every one of them is older
/// than the window. Newest-first ordering makes later pages older still.
fn page_predates_window(listed: &[ApiRelease], window: &TimeWindow) -> bool {
    let mut dated = listed.iter().filter_map(|r| r.published_at).peekable();
    dated.peek().is_some() && dated.all(|p| window.starts_after(p))
}

/// Map a 403/429 carrying rate-limit headers to [`AggregatorError::RateLimited`].
pub fn rate_limit_error(status: StatusCode, headers: &HeaderMap) -> Option<AggregatorError> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };
    let remaining = header("x-ratelimit-remaining");
    if remaining.is_none() && status == StatusCode::FORBIDDEN {
        return None;
    }
    let reset = header("x-ratelimit-reset").and_then(|ts| Utc.timestamp_opt(ts, 0).single());
    Some(AggregatorError::RateLimited {
        remaining: remaining.unwrap_or(0).max(0) as u64,
        reset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(tag: &str, name: Option<&str>, published: Option<&str>, draft: bool) -> ApiRelease {
        ApiRelease {
            tag_name: tag.to_string(),
            name: name.map(str::to_string),
            body: None,
            html_url: format!("https://github.com/o/r/releases/tag/{}", tag),
            draft,
            prerelease: false,
            published_at: published.map(|p| p.parse().unwrap()),
        }
    }

    fn week() -> TimeWindow {
        TimeWindow::for_iso_week(&Utc, 2024, 2).unwrap()
    }

    #[test]
    fn keeps_only_published_in_window_non_drafts() {
        let window = week();
        assert!(to_release(api("v1", None, Some("2024-01-09T10:00:00Z"), false), "o", "r", "c", &window).is_some());
        assert!(to_release(api("v2", None, Some("2024-01-09T10:00:00Z"), true), "o", "r", "c", &window).is_none());
        assert!(to_release(api("v3", None, None, false), "o", "r", "c", &window).is_none());
        assert!(to_release(api("v4", None, Some("2024-01-07T23:59:59Z"), false), "o", "r", "c", &window).is_none());
        assert!(to_release(api("v5", None, Some("2024-01-15T00:00:00Z"), false), "o", "r", "c", &window).is_none());
    }

    #[test]
    fn empty_name_falls_back_to_tag() {
        let window = week();
        let unnamed = to_release(api("v1.2.0", Some("  "), Some("2024-01-09T10:00:00Z"), false), "o", "r", "c", &window).unwrap();
        assert_eq!(unnamed.name, "v1.2.0");
        let named = to_release(api("v1.2.0", Some("Spring"), Some("2024-01-09T10:00:00Z"), false), "o", "r", "c", &window).unwrap();
        assert_eq!(named.name, "Spring");
        assert_eq!(named.category, "c");
    }

    #[test]
    fn page_older_than_window_stops_paging() {
        let window = week();
        let old = vec![
            api("v1", None, Some("2023-12-01T00:00:00Z"), false),
            api("v0", None, None, true),
        ];
        assert!(page_predates_window(&old, &window));
        let mixed = vec![
            api("v2", None, Some("2024-01-09T00:00:00Z"), false),
            api("v1", None, Some("2023-12-01T00:00:00Z"), false),
        ];
        assert!(!page_predates_window(&mixed, &window));
        assert!(!page_predates_window(&[], &window));
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let values = vec![
            serde_json::json!({"tag_name": "v1.0.0", "html_url": "https://github.com/o/r/releases/tag/v1.0.0"}),
            serde_json::json!({"name": "no tag"}),
            serde_json::json!("not an object"),
        ];
        let decoded = decode_page(values, "o", "r");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].tag_name, "v1.0.0");
    }

    #[test]
    fn rate_limit_needs_the_right_status_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704880800"));

        match rate_limit_error(StatusCode::FORBIDDEN, &headers) {
            Some(AggregatorError::RateLimited { remaining, reset }) => {
                assert_eq!(remaining, 0);
                assert_eq!(reset, Some(Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert!(rate_limit_error(StatusCode::OK, &headers).is_none());
        assert!(rate_limit_error(StatusCode::FORBIDDEN, &HeaderMap::new()).is_none());
        assert!(rate_limit_error(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()).is_some());
    }
}
