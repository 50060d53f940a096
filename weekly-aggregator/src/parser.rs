use crate::aggregators::time_bucket::TimeWindow;
use crate::types::{AggregatorError, NewsItem, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use tracing::debug;

pub const FEED_CATEGORY: &str = "news";

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Stateless RSS/Atom parser. Dedup happens later, across sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_feed(&self, content: &[u8]) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let entries = feed.entries.into_iter().map(Self::parse_entry).collect();
        Ok(ParsedFeed {
            title: feed.title.map(|t| t.content),
            entries,
        })
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> ParsedEntry {
        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();
        let url = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();
        let description = entry
            .summary
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        // Atom entries often carry only <updated>.
        let published_at = entry.published.or(entry.updated);

        ParsedEntry {
            title,
            url,
            description,
            published_at,
        }
    }

    /// Turn parsed entries into news items for `window`.
    ///
    /// Undated entries are stamped with `now` and always kept. Dated entries
    /// are kept when published at or after the window start; there is no upper
    /// bound. Entries missing a title or link are dropped.
    pub fn to_news_items(
        &self,
        parsed: ParsedFeed,
        source: &str,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        parsed
            .entries
            .into_iter()
            .filter(|e| !e.title.is_empty() && !e.url.is_empty())
            .filter_map(|e| {
                let published_at = e.published_at.unwrap_or(now);
                if published_at < window.start {
                    return None;
                }
                Some(NewsItem {
                    title: e.title,
                    url: e.url,
                    source: source.to_string(),
                    description: e.description,
                    published_at,
                    category: FEED_CATEGORY.to_string(),
                })
            })
            .collect()
    }
}
