use crate::aggregator::{classify, merge};
use crate::aggregators::time_bucket::TimeWindow;
use crate::config::{NewsSourceConfig, Repository, RepositoryConfig, TOKEN_ENV};
use crate::digest::{build_week_input, category_counts, WeekReport};
use crate::fetcher::Fetcher;
use crate::sources::{DiscussionSearch, GithubReleases, RssFeedSource, ScrapeSource};
use crate::state::RunStore;
use crate::traits::NewsSource;
use crate::types::{AggregatorError, NewsItem, RateLimitAction, Release, Result, Summarizer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_WEEK_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Run the news adapters as well as the release adapter.
    pub include_news: bool,
    /// Reload stored artifacts instead of crawling.
    pub skip_crawl: bool,
    pub on_rate_limit: RateLimitAction,
    /// Pause between weeks of a backfill.
    pub week_delay: Duration,
    pub repo_delay: Duration,
    pub max_pages: u32,
    pub github_token: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            include_news: true,
            skip_crawl: false,
            on_rate_limit: RateLimitAction::Skip,
            week_delay: DEFAULT_WEEK_DELAY,
            repo_delay: crate::sources::github_releases::DEFAULT_REPO_DELAY,
            max_pages: crate::sources::github_releases::DEFAULT_MAX_PAGES,
            github_token: None,
        }
    }
}

/// Runs the weekly collection: releases, then news (feeds, scrape targets,
/// discussion search), merge, classify, persist, summarize.
pub struct WeeklyPipeline<S: Summarizer> {
    repositories: Vec<Repository>,
    releases: GithubReleases,
    sources: Vec<Box<dyn NewsSource>>,
    store: RunStore,
    summarizer: S,
    fetcher: Arc<Fetcher>,
    options: PipelineOptions,
}

impl<S: Summarizer> WeeklyPipeline<S> {
    /// Wire adapters from configuration. Fails before any network call when
    /// nothing is configured or the release token is missing.
    pub fn new(
        repositories: RepositoryConfig,
        news: NewsSourceConfig,
        fetcher: Arc<Fetcher>,
        store: RunStore,
        summarizer: S,
        options: PipelineOptions,
    ) -> Result<Self> {
        repositories.validate()?;
        news.validate()?;

        if repositories.repositories.is_empty() && news.source_count() == 0 {
            return Err(AggregatorError::Config(
                "no repositories and no news sources configured".to_string(),
            ));
        }
        if !options.skip_crawl && !repositories.repositories.is_empty() && options.github_token.is_none() {
            return Err(AggregatorError::MissingCredential(TOKEN_ENV));
        }

        let mut releases = GithubReleases::new(fetcher.clone(), options.github_token.clone())
            .with_max_pages(options.max_pages)
            .with_repo_delay(options.repo_delay);
        if let Some(base) = &repositories.api_base {
            releases = releases.with_api_base(base.clone());
        }

        let sources = build_news_sources(&news, &fetcher);
        info!(
            "Pipeline ready: {} repositories, {} news sources, summarizer {}",
            repositories.repositories.len(),
            sources.len(),
            summarizer.name()
        );

        Ok(Self {
            repositories: repositories.repositories,
            releases,
            sources,
            store,
            summarizer,
            fetcher,
            options,
        })
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Collect, persist and summarize one week.
    pub async fn run_week(&self, window: &TimeWindow) -> Result<WeekReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("week", week = %window.week, run = %run_id);
        self.run_week_inner(run_id, window).instrument(span).await
    }

    async fn run_week_inner(&self, run_id: Uuid, window: &TimeWindow) -> Result<WeekReport> {
        info!("Collecting {}", window);
        let mut report = WeekReport::new(run_id, window.week);

        let (releases, news) = if self.options.skip_crawl {
            match self.reload(window)? {
                Some(found) => found,
                None => {
                    warn!("No stored releases for {}, skipping", window.week);
                    report.skipped = true;
                    return Ok(report);
                }
            }
        } else {
            let releases = self
                .releases
                .fetch_all(&self.repositories, window, self.options.on_rate_limit)
                .await?;
            let news = if self.options.include_news {
                self.collect_news(window).await?
            } else {
                Vec::new()
            };
            self.fetcher.check_cancelled()?;

            report.releases_path = Some(self.store.save_releases(window.week, &releases)?);
            if self.options.include_news {
                report.news_path = Some(self.store.save_news(window.week, &news)?);
            }
            (releases, news)
        };

        report.releases_found = releases.len();
        let (stable, prereleases) = classify(releases);
        report.stable_releases = stable.len();
        report.prereleases = prereleases.len();
        report.news_items = news.len();
        report.categories = category_counts(&stable);

        let input = build_week_input(window, stable, news);
        if input.is_empty() {
            info!("Nothing found for {}", window.week);
            report.skipped = true;
            return Ok(report);
        }

        match self.summarizer.summarize(&input).await {
            Ok(newsletter) => {
                report.digest_path = Some(self.store.save_digest(window.week, &newsletter.content)?);
            }
            Err(e) => error!("Summarizer {} failed for {}: {:#}", self.summarizer.name(), window.week, e),
        }
        Ok(report)
    }

    /// Run each window in order, pausing between weeks.
    ///
    /// Fatal errors end the backfill; anything else is logged and the week is
    /// left out of the returned reports.
    pub async fn backfill(&self, windows: &[TimeWindow]) -> Result<Vec<WeekReport>> {
        let mut reports = Vec::with_capacity(windows.len());
        for (i, window) in windows.iter().enumerate() {
            if i > 0 {
                self.fetcher.sleep(self.options.week_delay).await?;
            }
            info!("Backfill {}/{}: {}", i + 1, windows.len(), window);

            match self.run_week(window).await {
                Ok(report) => {
                    report.log();
                    reports.push(report);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("{} failed: {}", window.week, e),
            }
        }
        Ok(reports)
    }

    /// Pull every news source in configured order and merge the batches.
    async fn collect_news(&self, window: &TimeWindow) -> Result<Vec<NewsItem>> {
        let mut batches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.pull(window).await {
                Ok(items) => batches.push(items),
                Err(AggregatorError::Cancelled) => return Err(AggregatorError::Cancelled),
                Err(e) => warn!("{} failed: {}", source.source_name(), e),
            }
        }
        Ok(merge(batches))
    }

    fn reload(&self, window: &TimeWindow) -> Result<Option<(Vec<Release>, Vec<NewsItem>)>> {
        let Some(releases) = self.store.load_releases(window.week)? else {
            return Ok(None);
        };
        let news = self.store.load_news(window.week)?.unwrap_or_default();
        info!("Reloaded {} releases and {} news items", releases.len(), news.len());
        Ok(Some((releases, news)))
    }
}

/// News adapters in pull order: feeds, scrape targets, discussion search.
pub fn build_news_sources(news: &NewsSourceConfig, fetcher: &Arc<Fetcher>) -> Vec<Box<dyn NewsSource>> {
    let mut sources: Vec<Box<dyn NewsSource>> = Vec::new();

    for feed in &news.rss_feeds {
        sources.push(Box::new(RssFeedSource::new(&feed.name, &feed.url, fetcher.clone())));
    }
    for target in &news.scrape_sources {
        let source = ScrapeSource::new(&target.name, &target.url, fetcher.clone())
            .with_selector(target.selector.clone())
            .with_base_url(target.base_url.clone());
        sources.push(Box::new(source));
    }
    if news.hackernews.enabled {
        let mut search = DiscussionSearch::new(news.hackernews.keywords.clone(), fetcher.clone());
        if let Some(queries) = &news.hackernews.combined_queries {
            search = search.with_combined_queries(queries.clone());
        }
        if let Some(base) = &news.hackernews.api_base {
            search = search.with_api_base(base.clone());
        }
        sources.push(Box::new(search));
    }
    sources
}
