use crate::aggregator::dedup_by_title;
use crate::aggregators::time_bucket::TimeWindow;
use crate::fetcher::{ensure_success, Fetcher};
use crate::traits::{NewsSource, SourceKind};
use crate::types::{AggregatorError, NewsItem, Result};
use crate::utils::text::{sanitize_json, truncate_chars};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://hn.algolia.com/api/v1";
pub const DEFAULT_COMBINED_QUERIES: [&str; 4] = [
    "kubernetes OR k8s",
    "docker container",
    "cloud infrastructure",
    "devops platform",
];
pub const SOURCE_NAME: &str = "Hacker News";
pub const DISCUSSION_CATEGORY: &str = "community";

const KEYWORD_HITS: u32 = 50;
const FRONT_PAGE_HITS: u32 = 100;
const MIN_POINTS: i64 = 3;
const MIN_COMMENTS: i64 = 2;
const DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub story_text: Option<String>,
    #[serde(rename = "objectID", default)]
    pub object_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_at_i: Option<i64>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
}

impl Hit {
    /// Keyword and combined results need a minimum of engagement to count.
    pub fn passes_engagement(&self) -> bool {
        self.points.unwrap_or(0) >= MIN_POINTS || self.num_comments.unwrap_or(0) >= MIN_COMMENTS
    }

    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.created_at_i
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .or_else(|| {
                self.created_at
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|d| d.with_timezone(&Utc))
            })
    }

    pub fn into_news_item(self) -> Option<NewsItem> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default().to_string();
        if title.is_empty() {
            return None;
        }
        let published_at = self.published_at()?;
        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ if !self.object_id.is_empty() => {
                format!("https://news.ycombinator.com/item?id={}", self.object_id)
            }
            _ => return None,
        };
        let description = truncate_chars(self.story_text.as_deref().unwrap_or_default(), DESCRIPTION_CHARS);

        Some(NewsItem {
            title,
            url,
            source: SOURCE_NAME.to_string(),
            description,
            published_at,
            category: DISCUSSION_CATEGORY.to_string(),
        })
    }
}

/// Keep items whose title or description mentions any keyword, ignoring case.
pub fn filter_relevant(items: Vec<NewsItem>, keywords: &[String]) -> Vec<NewsItem> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    items
        .into_iter()
        .filter(|item| {
            let title = item.title.to_lowercase();
            let description = item.description.to_lowercase();
            keywords
                .iter()
                .any(|kw| title.contains(kw.as_str()) || description.contains(kw.as_str()))
        })
        .collect()
}

/// Community discussion search against the Algolia HN API.
///
/// Three strategies run in order: one query per keyword, the combined
/// queries, then the front page filtered by keyword relevance. A failed query
/// is logged and skipped.
pub struct DiscussionSearch {
    api_base: String,
    keywords: Vec<String>,
    combined_queries: Vec<String>,
    fetcher: Arc<Fetcher>,
}

impl DiscussionSearch {
    pub fn new(keywords: Vec<String>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            keywords,
            combined_queries: DEFAULT_COMBINED_QUERIES.iter().map(|q| q.to_string()).collect(),
            fetcher,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_combined_queries(mut self, queries: Vec<String>) -> Self {
        self.combined_queries = queries;
        self
    }

    pub async fn search(&self, keywords: &[String], window: &TimeWindow) -> Result<Vec<NewsItem>> {
        let since = window.start.timestamp();
        let mut items = Vec::new();

        for keyword in keywords {
            let hits = self.query_or_skip(Some(keyword.as_str()), "story", KEYWORD_HITS, since).await?;
            let found: Vec<NewsItem> = engaged_items(hits);
            debug!("HN keyword {:?}: {} items", keyword, found.len());
            items.extend(found);
        }

        for query in &self.combined_queries {
            let hits = self.query_or_skip(Some(query.as_str()), "story", KEYWORD_HITS, since).await?;
            let found: Vec<NewsItem> = engaged_items(hits);
            debug!("HN combined {:?}: {} items", query, found.len());
            items.extend(found);
        }

        let front_page = self.query_or_skip(None, "front_page", FRONT_PAGE_HITS, since).await?;
        let front_page: Vec<NewsItem> = front_page.into_iter().filter_map(Hit::into_news_item).collect();
        let relevant = filter_relevant(front_page, keywords);
        debug!("HN front page: {} relevant items", relevant.len());
        items.extend(relevant);

        let items = dedup_by_title(items);
        info!("Found {} unique HN items", items.len());
        Ok(items)
    }

    async fn query_or_skip(&self, query: Option<&str>, tags: &str, hits_per_page: u32, since: i64) -> Result<Vec<Hit>> {
        match self.query(query, tags, hits_per_page, since).await {
            Ok(hits) => Ok(hits),
            Err(AggregatorError::Cancelled) => Err(AggregatorError::Cancelled),
            Err(e) => {
                warn!("HN query {:?} ({}) failed: {}", query.unwrap_or(""), tags, e);
                Ok(Vec::new())
            }
        }
    }

    async fn query(&self, query: Option<&str>, tags: &str, hits_per_page: u32, since: i64) -> Result<Vec<Hit>> {
        let numeric_filter = format!("created_at_i>{}", since);
        let hits_per_page = hits_per_page.to_string();
        let mut params: Vec<(&str, &str)> = Vec::with_capacity(4);
        if let Some(query) = query {
            params.push(("query", query));
        }
        params.push(("tags", tags));
        params.push(("numericFilters", numeric_filter.as_str()));
        params.push(("hitsPerPage", hits_per_page.as_str()));

        let url = Url::parse_with_params(&format!("{}/search", self.api_base.trim_end_matches('/')), &params)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let response = ensure_success(self.fetcher.get(url.as_str(), headers).await?)?;
        let body = self.fetcher.read_bytes(response).await?;
        let parsed: SearchResponse = serde_json::from_str(&sanitize_json(&body))?;
        Ok(parsed.hits)
    }
}

fn engaged_items(hits: Vec<Hit>) -> Vec<NewsItem> {
    hits.into_iter()
        .filter(Hit::passes_engagement)
        .filter_map(Hit::into_news_item)
        .collect()
}

#[async_trait]
impl NewsSource for DiscussionSearch {
    fn source_name(&self) -> String {
        SOURCE_NAME.to_string()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Discussion
    }

    async fn pull(&self, window: &TimeWindow) -> Result<Vec<NewsItem>> {
        self.search(&self.keywords, window).await
    }
}
