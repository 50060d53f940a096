use crate::aggregators::time_bucket::TimeWindow;
use crate::fetcher::{ensure_success, Fetcher};
use crate::parser::FeedParser;
use crate::traits::{NewsSource, SourceKind};
use crate::types::{NewsItem, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::info;

/// One configured RSS/Atom feed.
pub struct RssFeedSource {
    pub name: String,
    pub url: String,
    fetcher: Arc<Fetcher>,
    parser: FeedParser,
}

impl RssFeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, fetcher: Arc<Fetcher>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            fetcher,
            parser: FeedParser::new(),
        }
    }
}

#[async_trait]
impl NewsSource for RssFeedSource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    async fn pull(&self, window: &TimeWindow) -> Result<Vec<NewsItem>> {
        info!("Pulling RSS feed {} ({})", self.name, self.url);

        let response = ensure_success(self.fetcher.get(&self.url, HeaderMap::new()).await?)?;
        let body = self.fetcher.read_bytes(response).await?;
        let parsed = self.parser.parse_feed(&body)?;
        let items = self.parser.to_news_items(parsed, &self.name, window, Utc::now());

        info!("Pulled {} items from RSS feed {}", items.len(), self.name);
        Ok(items)
    }
}
