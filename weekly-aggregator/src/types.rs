use chrono::{DateTime, Utc};
// Use the interfaces crate for the shared data model
pub use interfaces::defs::{IsoWeek, NewsItem, Newsletter, Release, Summarizer, WeekInput};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Sent instead of `user_agent` to sites that reject non-browser clients.
    pub browser_user_agent: String,
    pub accept_language: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    /// Retries for connect/timeout failures only; HTTP statuses are never retried.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Minimum spacing between two requests to the same host.
    pub request_delay_ms: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("weekly-aggregator/{}", env!("CARGO_PKG_VERSION")),
            browser_user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            accept_language: "de-DE,de;q=0.9,en;q=0.8".to_string(),
            timeout_seconds: 30,
            connect_timeout_seconds: 15,
            max_retries: 2,
            retry_delay_ms: 500,
            request_delay_ms: 100,
            max_redirects: 5,
        }
    }
}

/// What a batch does after a provider reports an exhausted quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateLimitAction {
    /// Log and move on to the next repository.
    #[default]
    Skip,
    /// Stop calling the provider and keep what was already collected.
    Abort,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Rate limited: {} requests remaining, reset at {}", .remaining, format_reset(.reset))]
    RateLimited {
        remaining: u64,
        reset: Option<DateTime<Utc>>,
    },

    #[error("Invalid ISO week {week} for year {year}")]
    InvalidWeek { year: i32, week: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("General error: {0}")]
    General(String),
}

fn format_reset(reset: &Option<DateTime<Utc>>) -> String {
    reset
        .map(|r| r.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}

impl AggregatorError {
    /// Errors that must stop the whole run rather than one source.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AggregatorError::Cancelled
                | AggregatorError::Config(_)
                | AggregatorError::MissingCredential(_)
                | AggregatorError::InvalidWeek { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
