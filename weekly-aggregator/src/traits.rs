use crate::aggregators::time_bucket::TimeWindow;
use crate::types::{NewsItem, Result};
use async_trait::async_trait;

/// Where a news item came from; fixes the order sources are pulled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    Feed,
    Scrape,
    Discussion,
}

/// Trait for pulling news items for one time window from a single origin
/// (an RSS feed, a scraped listing page, a discussion search).
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Human-readable name, also used as `NewsItem::source`.
    fn source_name(&self) -> String;

    fn kind(&self) -> SourceKind;

    /// Fetch the items that belong to `window`.
    ///
    /// Transport and parse failures come back as `Err`; the caller logs them
    /// and moves on. Only `Cancelled` is meant to stop a run.
    async fn pull(&self, window: &TimeWindow) -> Result<Vec<NewsItem>>;
}
