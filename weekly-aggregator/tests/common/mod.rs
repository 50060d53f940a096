#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::{Arc, Once};
use weekly_aggregator::{FetchConfig, Fetcher};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// No pacing, no retries: mock servers answer instantly and deterministically.
pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        user_agent: "weekly-aggregator-test/1.0".to_string(),
        request_delay_ms: 0,
        max_retries: 0,
        timeout_seconds: 5,
        connect_timeout_seconds: 2,
        ..FetchConfig::default()
    }
}

pub fn test_fetcher() -> Arc<Fetcher> {
    Arc::new(Fetcher::new(test_fetch_config()).expect("client builds"))
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("valid RFC 3339 timestamp")
}

pub fn github_release(tag: &str, published_at: &str) -> serde_json::Value {
    serde_json::json!({
        "tag_name": tag,
        "name": "",
        "body": format!("Release notes for {}", tag),
        "html_url": format!("https://github.com/acme/project/releases/tag/{}", tag),
        "draft": false,
        "prerelease": false,
        "published_at": published_at,
    })
}

pub fn rss_feed(items: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test Feed</title><link>https://feed.example</link><description>test</description>"#,
    );
    for (title, link, pub_date) in items {
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate></item>",
            title, link, pub_date
        ));
    }
    body.push_str("</channel></rss>");
    body
}
