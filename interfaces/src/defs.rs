use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One software release event, as published by a tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub repo_owner: String,
    pub repo_name: String,
    pub tag_name: String,
    pub name: String,
    #[serde(default)]
    pub body: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub category: String,
    // Reported by the hosting provider; advisory only.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_prerelease: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One news or discussion item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// File name stem used for per-week artifacts, e.g. `2024-week-03`.
    pub fn file_stem(&self) -> String {
        format!("{}-week-{:02}", self.year, self.week)
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Everything the summarizer gets for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekInput {
    pub week: IsoWeek,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub releases: Vec<Release>,
    pub news: Vec<NewsItem>,
}

impl WeekInput {
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty() && self.news.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Newsletter {
    pub title: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub content: String,
    pub summary: String,
    pub highlights: Vec<String>,
    pub releases: Vec<Release>,
    pub news_items: Vec<NewsItem>,
}

// Object style note:
// A summarizer is handed one finished week at a time and returns free text.
// The pipeline never looks inside `content`; it only persists it. Keep
// implementations free of hidden global state so they can be swapped in
// tests.

#[allow(async_fn_in_trait)]
pub trait Summarizer {
    fn name(&self) -> &str;
    async fn summarize(&self, input: &WeekInput) -> anyhow::Result<Newsletter>;
}
