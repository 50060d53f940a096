use anyhow::Result;

use crate::defs::Newsletter;
use crate::defs::Summarizer;
use crate::defs::WeekInput;

pub struct EmptySummarizer;

impl Summarizer for EmptySummarizer {
    fn name(&self) -> &str {
        "empty"
    }

    async fn summarize(&self, input: &WeekInput) -> Result<Newsletter> {
        // Nothing matters, the ideal newsletter is empty.
        Ok(Newsletter {
            title: String::new(),
            week_start: input.window_start,
            week_end: input.window_end,
            content: String::new(),
            summary: String::new(),
            highlights: vec![],
            releases: input.releases.clone(),
            news_items: input.news.clone(),
        })
    }
}
