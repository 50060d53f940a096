use crate::types::{AggregatorError, Result};
use crate::utils::url::is_valid_http_url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub repo: String,
    /// Display name; logs only.
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
}

impl Repository {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    /// Override for the releases API root, e.g. a GitHub Enterprise host.
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HackerNewsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub combined_queries: Option<Vec<String>>,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSourceConfig {
    #[serde(default)]
    pub rss_feeds: Vec<RssSource>,
    #[serde(default)]
    pub scrape_sources: Vec<ScrapeTarget>,
    #[serde(default)]
    pub hackernews: HackerNewsConfig,
}

impl NewsSourceConfig {
    pub fn source_count(&self) -> usize {
        let discussion = usize::from(self.hackernews.enabled);
        self.rss_feeds.len() + self.scrape_sources.len() + discussion
    }
}

impl RepositoryConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for repo in &self.repositories {
            if repo.owner.trim().is_empty() || repo.repo.trim().is_empty() {
                return Err(AggregatorError::Config(format!(
                    "repository entry needs owner and repo, got {:?}",
                    repo
                )));
            }
            if repo.category.trim().is_empty() {
                return Err(AggregatorError::Config(format!("{} has no category", repo.slug())));
            }
        }
        if let Some(base) = &self.api_base {
            check_url("api_base", base)?;
        }
        Ok(())
    }
}

impl NewsSourceConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for feed in &self.rss_feeds {
            check_url(&feed.name, &feed.url)?;
        }
        for target in &self.scrape_sources {
            check_url(&target.name, &target.url)?;
            if let Some(base) = &target.base_url {
                check_url(&target.name, base)?;
            }
        }
        if self.hackernews.enabled && self.hackernews.keywords.is_empty() {
            return Err(AggregatorError::Config(
                "hackernews is enabled but has no keywords".to_string(),
            ));
        }
        if let Some(base) = &self.hackernews.api_base {
            check_url("hackernews.api_base", base)?;
        }
        Ok(())
    }
}

fn check_url(owner: &str, url: &str) -> Result<()> {
    if is_valid_http_url(url) {
        Ok(())
    } else {
        Err(AggregatorError::Config(format!("{}: {:?} is not an http(s) URL", owner, url)))
    }
}

fn read_config(path: &Path) -> Result<String> {
    debug!("Loading configuration from {}", path.display());
    fs::read_to_string(path)
        .map_err(|e| AggregatorError::Config(format!("reading {}: {}", path.display(), e)))
}

pub fn load_repositories(path: &Path) -> Result<RepositoryConfig> {
    RepositoryConfig::from_yaml_str(&read_config(path)?)
}

pub fn load_news_sources(path: &Path) -> Result<NewsSourceConfig> {
    NewsSourceConfig::from_yaml_str(&read_config(path)?)
}

/// Bearer token for the releases API, from the environment.
pub fn github_token() -> Result<String> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AggregatorError::MissingCredential(TOKEN_ENV)),
    }
}
