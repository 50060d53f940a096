use crate::types::{AggregatorError, FetchConfig, Result};
use crate::utils::text::sanitize_utf8;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Shared HTTP client for every adapter: per-host pacing, retry of transient
/// transport failures, and cancellation.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    next_slot: Mutex<HashMap<String, Instant>>,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            next_slot: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Issue a GET with `headers` layered over the client defaults.
    ///
    /// Non-2xx responses are returned as-is; callers decide what a status means.
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<Response> {
        let parsed = Url::parse(url)?;
        self.pace(&parsed).await?;

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(self.config.retry_delay_ms),
            initial_interval: Duration::from_millis(self.config.retry_delay_ms),
            max_interval: Duration::from_millis(self.config.retry_delay_ms * 16),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            let request = self.client.get(parsed.clone()).headers(headers.clone());
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AggregatorError::Cancelled),
                outcome = request.send() => outcome,
            };

            match outcome {
                Ok(response) => {
                    debug!("GET {} -> {}", url, response.status());
                    return Ok(response);
                }
                Err(e) if is_transient(&e) && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_millis(self.config.retry_delay_ms));
                    warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt, url, e, delay);
                    self.sleep(delay).await?;
                }
                Err(e) => return Err(AggregatorError::Http(e)),
            }
        }
    }

    /// Read the whole body, giving up as soon as the run is cancelled.
    pub async fn read_bytes(&self, response: Response) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AggregatorError::Cancelled),
            body = response.bytes() => Ok(body?.to_vec()),
        }
    }

    /// Body as text with invalid UTF-8 sequences dropped.
    pub async fn read_text(&self, response: Response) -> Result<String> {
        let bytes = self.read_bytes(response).await?;
        Ok(sanitize_utf8(&bytes))
    }

    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return self.check_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AggregatorError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AggregatorError::Cancelled);
        }
        Ok(())
    }

    /// Headers that make a request look like a desktop browser.
    pub fn browser_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&self.config.browser_user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, header_value(&self.config.accept_language)?);
        Ok(headers)
    }

    async fn pace(&self, url: &Url) -> Result<()> {
        self.check_cancelled()?;
        let spacing = Duration::from_millis(self.config.request_delay_ms);
        if spacing.is_zero() {
            return Ok(());
        }

        let host = url.host_str().unwrap_or_default().to_string();
        let now = Instant::now();
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let slot = slots.get(&host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.clone(), slot + spacing);
            slot
        };

        if slot > now {
            debug!("Pacing {}: waiting {:?}", host, slot - now);
            self.sleep(slot - now).await?;
        }
        Ok(())
    }
}

/// Turn a non-2xx response into [`AggregatorError::Status`].
pub fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AggregatorError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

pub fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AggregatorError::Config(format!("invalid header value {:?}: {}", value, e)))
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}
