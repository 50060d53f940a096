use crate::aggregators::time_bucket::TimeWindow;
use crate::types::{IsoWeek, NewsItem, Release, WeekInput};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Hand-off for the summarizer: stable releases, all news, the resolved week.
pub fn build_week_input(window: &TimeWindow, stable: Vec<Release>, news: Vec<NewsItem>) -> WeekInput {
    WeekInput {
        week: window.week,
        window_start: window.start,
        window_end: window.end,
        releases: stable,
        news,
    }
}

/// Release counts per configured category, in category order.
pub fn category_counts(releases: &[Release]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for release in releases {
        *counts.entry(release.category.clone()).or_insert(0) += 1;
    }
    counts
}

/// Outcome of one week's run.
#[derive(Debug, Clone)]
pub struct WeekReport {
    pub run_id: Uuid,
    pub week: IsoWeek,
    pub releases_found: usize,
    pub stable_releases: usize,
    pub prereleases: usize,
    pub news_items: usize,
    pub categories: BTreeMap<String, usize>,
    pub releases_path: Option<PathBuf>,
    pub news_path: Option<PathBuf>,
    pub digest_path: Option<PathBuf>,
    /// Set when nothing was found (or nothing was stored) and summarizing was skipped.
    pub skipped: bool,
}

impl WeekReport {
    pub fn new(run_id: Uuid, week: IsoWeek) -> Self {
        Self {
            run_id,
            week,
            releases_found: 0,
            stable_releases: 0,
            prereleases: 0,
            news_items: 0,
            categories: BTreeMap::new(),
            releases_path: None,
            news_path: None,
            digest_path: None,
            skipped: false,
        }
    }

    pub fn log(&self) {
        if self.skipped {
            info!("{}: nothing to summarize (run {})", self.week, self.run_id);
            return;
        }
        info!(
            "{}: {} releases ({} stable, {} pre-release), {} news items",
            self.week, self.releases_found, self.stable_releases, self.prereleases, self.news_items
        );
        for (category, count) in &self.categories {
            info!("  {}: {}", category, count);
        }
        if let Some(path) = &self.digest_path {
            info!("  digest: {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn release(repo: &str, category: &str) -> Release {
        Release {
            repo_owner: "acme".to_string(),
            repo_name: repo.to_string(),
            tag_name: "v1.0.0".to_string(),
            name: "v1.0.0".to_string(),
            body: String::new(),
            url: format!("https://github.com/acme/{}", repo),
            published_at: Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap(),
            category: category.to_string(),
            is_prerelease: false,
        }
    }

    #[test]
    fn counts_releases_per_category() {
        let counts = category_counts(&[
            release("a", "runtime"),
            release("b", "networking"),
            release("c", "runtime"),
        ]);
        assert_eq!(counts.get("runtime"), Some(&2));
        assert_eq!(counts.get("networking"), Some(&1));
        assert_eq!(counts.keys().next().map(String::as_str), Some("networking"));
    }

    #[test]
    fn week_input_carries_the_window() {
        let window = TimeWindow::for_iso_week(&Utc, 2024, 2).unwrap();
        let input = build_week_input(&window, vec![release("a", "runtime")], Vec::new());
        assert_eq!(input.week, IsoWeek::new(2024, 2));
        assert_eq!(input.window_start, window.start);
        assert_eq!(input.window_end, window.end);
        assert!(!input.is_empty());
    }
}
