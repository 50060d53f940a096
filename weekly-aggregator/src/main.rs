use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use clap::Parser;
use interfaces::BaselineSummarizer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weekly_aggregator::config::{self, github_token};
use weekly_aggregator::{backfill_windows, FetchConfig, Fetcher, PipelineOptions, RunStore, TimeWindow, WeeklyPipeline};

/// Collects releases and news per ISO week and hands them to a summarizer.
#[derive(Debug, Parser)]
#[command(name = "weekly-aggregator", version)]
struct Cli {
    /// Tracked repositories.
    #[arg(long, global = true, default_value = "config/repositories.yaml")]
    repos: PathBuf,

    /// RSS feeds, scrape targets and discussion search settings.
    #[arg(long, global = true, default_value = "config/news-sources.yaml")]
    news: PathBuf,

    /// Where per-week artifacts are written.
    #[arg(long, global = true, default_value = "data")]
    data: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Collect the last few days, releases and news.
    Crawl(CrawlArgs),

    /// Re-run past weeks.
    Backfill(BackfillArgs),
}

#[derive(Debug, clap::Args)]
struct CrawlArgs {
    #[arg(long, default_value_t = 7)]
    days: u32,
}

#[derive(Debug, clap::Args)]
struct BackfillArgs {
    /// Number of completed weeks before the current one.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=10))]
    weeks: u32,

    /// A single ISO week instead of the last `--weeks`.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=53))]
    week: Option<u32>,

    /// ISO year for `--week`; defaults to the current one.
    #[arg(long, requires = "week")]
    year: Option<i32>,

    /// Also run the news adapters. Their filters have no upper bound.
    #[arg(long)]
    include_news: bool,

    /// Summarize stored artifacts instead of crawling.
    #[arg(long)]
    skip_crawl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            on_signal.cancel();
        }
    });

    let repositories = config::load_repositories(&cli.repos)
        .with_context(|| format!("loading {}", cli.repos.display()))?;
    let news = config::load_news_sources(&cli.news)
        .with_context(|| format!("loading {}", cli.news.display()))?;

    let fetcher = Arc::new(Fetcher::new(FetchConfig::default())?.with_cancellation(cancel));
    let store = RunStore::new(&cli.data);
    let now = Local::now();

    match cli.cmd {
        Command::Crawl(args) => {
            let options = PipelineOptions {
                include_news: true,
                github_token: github_token().ok(),
                ..PipelineOptions::default()
            };
            let pipeline = WeeklyPipeline::new(repositories, news, fetcher, store, BaselineSummarizer, options)?;
            let window = TimeWindow::last_days(&now, args.days);
            info!("Crawling {}", window);
            let report = pipeline.run_week(&window).await?;
            report.log();
        }
        Command::Backfill(args) => {
            let windows = match args.week {
                Some(week) => {
                    let year = args.year.unwrap_or_else(|| now.iso_week().year());
                    vec![TimeWindow::for_iso_week(&Local, year, week)?]
                }
                None => backfill_windows(&now, args.weeks)?,
            };
            let options = PipelineOptions {
                include_news: args.include_news,
                skip_crawl: args.skip_crawl,
                github_token: github_token().ok(),
                ..PipelineOptions::default()
            };
            let pipeline = WeeklyPipeline::new(repositories, news, fetcher, store, BaselineSummarizer, options)?;
            let reports = pipeline.backfill(&windows).await?;
            info!("Backfill finished: {} of {} weeks processed", reports.len(), windows.len());
        }
    }
    Ok(())
}
