use anyhow::Result;
use std::collections::BTreeMap;

use crate::defs::NewsItem;
use crate::defs::Newsletter;
use crate::defs::Release;
use crate::defs::Summarizer;
use crate::defs::WeekInput;

const MAX_HIGHLIGHTS: usize = 5;
const MAX_BODY_CHARS: usize = 280;

struct PonderedWeek {
    pub title: String,
}

async fn ponder_week(input: &WeekInput) -> Result<PonderedWeek> {
    Ok(PonderedWeek {
        title: format!("Week {} - {}", input.week.week, input.window_start.format("%B %Y")),
    })
}

#[derive(Clone)]
struct FocusedSummary {
    pub category: String,
    pub line: String,
}

async fn summarize_release(release: &Release) -> Result<FocusedSummary> {
    let headline = release.body.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    let headline = clip(headline, MAX_BODY_CHARS);
    let mut line = format!("- **{}/{}** [{}]({})", release.repo_owner, release.repo_name, release.name, release.url);
    if !headline.is_empty() {
        line.push_str(": ");
        line.push_str(&headline);
    }
    Ok(FocusedSummary {
        category: release.category.clone(),
        line,
    })
}

fn summarize_news(item: &NewsItem) -> String {
    format!("- [{}]({}) ({})", item.title, item.url, item.source)
}

fn select_highlights(releases: &[Release]) -> Vec<String> {
    let mut highlights: Vec<String> = Vec::new();
    for release in releases {
        if highlights.len() >= MAX_HIGHLIGHTS {
            break;
        }
        if !highlights.contains(&release.repo_name) {
            highlights.push(release.repo_name.clone());
        }
    }
    highlights
}

async fn compose_content(pondered: &PonderedWeek, summaries: &[FocusedSummary], news: &[NewsItem]) -> Result<String> {
    let mut by_category: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for summary in summaries {
        by_category.entry(summary.category.as_str()).or_default().push(summary.line.as_str());
    }

    let mut content = format!("# {}\n", pondered.title);
    if !by_category.is_empty() {
        content.push_str("\n## Releases\n");
        for (category, lines) in by_category {
            content.push_str(&format!("\n### {}\n\n", category));
            for line in lines {
                content.push_str(line);
                content.push('\n');
            }
        }
    }
    if !news.is_empty() {
        content.push_str("\n## News\n\n");
        for item in news {
            content.push_str(&summarize_news(item));
            content.push('\n');
        }
    }
    Ok(content)
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let clipped: String = text.chars().take(max_chars).collect();
    format!("{}...", clipped.trim_end())
}

/// Deterministic, model-free summarizer: lists stable releases by category
/// followed by the week's news.
pub struct BaselineSummarizer;

impl Summarizer for BaselineSummarizer {
    fn name(&self) -> &str {
        "baseline"
    }

    async fn summarize(&self, input: &WeekInput) -> Result<Newsletter> {
        let pondered = ponder_week(input).await?;
        let summaries = futures::future::join_all(input.releases.iter().map(summarize_release))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        let content = compose_content(&pondered, &summaries, &input.news).await?;
        Ok(Newsletter {
            title: pondered.title,
            week_start: input.window_start,
            week_end: input.window_end,
            content,
            summary: format!("This week: {} releases and {} news items.", input.releases.len(), input.news.len()),
            highlights: select_highlights(&input.releases),
            releases: input.releases.clone(),
            news_items: input.news.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::IsoWeek;
    use chrono::{TimeZone, Utc};

    fn release(repo: &str, tag: &str, category: &str, body: &str) -> Release {
        Release {
            repo_owner: "acme".into(),
            repo_name: repo.into(),
            tag_name: tag.into(),
            name: tag.into(),
            body: body.into(),
            url: format!("https://github.com/acme/{}/releases/tag/{}", repo, tag),
            published_at: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
            category: category.into(),
            is_prerelease: false,
        }
    }

    #[tokio::test]
    async fn groups_releases_by_category_and_lists_news() {
        let input = WeekInput {
            week: IsoWeek::new(2024, 2),
            window_start: Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 59).unwrap(),
            releases: vec![
                release("proxy", "v2.1.0", "networking", "\n  Faster routing\nmore"),
                release("store", "v0.9.0", "storage", ""),
                release("mesh", "v1.0.0", "networking", "GA"),
            ],
            news: vec![NewsItem {
                title: "Operators at scale".into(),
                url: "https://example.com/operators".into(),
                source: "Example Blog".into(),
                description: String::new(),
                published_at: Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap(),
                category: "news".into(),
            }],
        };

        let newsletter = BaselineSummarizer.summarize(&input).await.unwrap();

        assert_eq!(newsletter.title, "Week 2 - January 2024");
        assert_eq!(newsletter.highlights, vec!["proxy", "store", "mesh"]);
        let networking = newsletter.content.find("### networking").unwrap();
        let storage = newsletter.content.find("### storage").unwrap();
        assert!(networking < storage);
        assert!(newsletter.content.contains("[v2.1.0](https://github.com/acme/proxy/releases/tag/v2.1.0): Faster routing"));
        assert!(newsletter.content.contains("- [Operators at scale](https://example.com/operators) (Example Blog)"));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("äöü", 5), "äöü");
        assert_eq!(clip("äöüäöü", 3), "äöü...");
    }
}
