use crate::types::{IsoWeek, NewsItem, Release, Result};
use crate::utils::text::sanitize_utf8;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flat-file artifacts of past runs, one set per ISO week.
///
/// Layout inside `data_dir`:
/// `releases-2024-week-03.json`, `news-2024-week-03.json`, `digest-2024-week-03.md`.
#[derive(Debug, Clone)]
pub struct RunStore {
    data_dir: PathBuf,
}

impl RunStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn releases_path(&self, week: IsoWeek) -> PathBuf {
        self.data_dir.join(format!("releases-{}.json", week.file_stem()))
    }

    pub fn news_path(&self, week: IsoWeek) -> PathBuf {
        self.data_dir.join(format!("news-{}.json", week.file_stem()))
    }

    pub fn digest_path(&self, week: IsoWeek) -> PathBuf {
        self.data_dir.join(format!("digest-{}.md", week.file_stem()))
    }

    pub fn save_releases(&self, week: IsoWeek, releases: &[Release]) -> Result<PathBuf> {
        let path = self.releases_path(week);
        self.write_json(&path, releases)?;
        info!("Saved {} releases to {}", releases.len(), path.display());
        Ok(path)
    }

    pub fn save_news(&self, week: IsoWeek, news: &[NewsItem]) -> Result<PathBuf> {
        let path = self.news_path(week);
        self.write_json(&path, news)?;
        info!("Saved {} news items to {}", news.len(), path.display());
        Ok(path)
    }

    pub fn save_digest(&self, week: IsoWeek, content: &str) -> Result<PathBuf> {
        let path = self.digest_path(week);
        self.ensure_dir()?;
        fs::write(&path, content)?;
        info!("Saved digest to {}", path.display());
        Ok(path)
    }

    /// `Ok(None)` when no releases were persisted for `week`.
    pub fn load_releases(&self, week: IsoWeek) -> Result<Option<Vec<Release>>> {
        self.read_json(&self.releases_path(week))
    }

    /// `Ok(None)` when no news was persisted for `week`.
    pub fn load_news(&self, week: IsoWeek) -> Result<Option<Vec<NewsItem>>> {
        self.read_json(&self.news_path(week))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            debug!("No stored artifact at {}", path.display());
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let text = sanitize_utf8(&bytes);
        Ok(Some(serde_json::from_str(&text)?))
    }
}
