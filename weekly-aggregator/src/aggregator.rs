use crate::types::{NewsItem, Release};
use std::collections::HashSet;
use tracing::{debug, info};

/// Substrings that mark a tag as a pre-release wherever they appear.
pub const PRERELEASE_MARKERS: [&str; 17] = [
    "-rc", "-alpha", "-beta", "-test", "-dev", "-preview", "-pre", "-next", "-canary", "-nightly",
    "-snapshot", "alpha.", "beta.", "test.", "dev.", "preview.", "edge-",
];

/// Words that mark a pre-release when directly preceded by `.` or `-`.
pub const PRERELEASE_SUFFIXES: [&str; 8] = ["rc", "alpha", "beta", "test", "dev", "preview", "pre", "next"];

/// Identity used for cross-source dedup. Distinct stories that share a
/// title collapse into one.
pub fn dedup_key(item: &NewsItem) -> String {
    item.title.to_lowercase()
}

/// Drop repeated titles, keeping the first occurrence and the input order.
pub fn dedup_by_title(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let before = items.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| seen.insert(dedup_key(item)))
        .collect();

    let removed = before - unique.len();
    if removed > 0 {
        debug!("Removed {} duplicate news items", removed);
    }
    unique
}

/// Concatenate per-adapter batches in the order given, then dedup.
pub fn merge(batches: Vec<Vec<NewsItem>>) -> Vec<NewsItem> {
    let merged = dedup_by_title(batches.into_iter().flatten().collect());
    info!("Merged {} unique news items", merged.len());
    merged
}

/// Tag-based pre-release check. The provider's own flag is not consulted.
pub fn is_prerelease(tag: &str) -> bool {
    let tag = tag.to_lowercase();
    if PRERELEASE_MARKERS.iter().any(|marker| tag.contains(marker)) {
        return true;
    }
    PRERELEASE_SUFFIXES.iter().any(|word| {
        tag.contains(&format!(".{}", word)) || tag.contains(&format!("-{}", word))
    })
}

/// Split releases into `(stable, prerelease)`, preserving order within each.
pub fn classify(releases: Vec<Release>) -> (Vec<Release>, Vec<Release>) {
    let (prerelease, stable): (Vec<Release>, Vec<Release>) =
        releases.into_iter().partition(|r| is_prerelease(&r.tag_name));

    info!(
        "Kept {} stable releases, filtered {} pre-releases",
        stable.len(),
        prerelease.len()
    );
    if !prerelease.is_empty() {
        let filtered: Vec<String> = prerelease
            .iter()
            .map(|r| format!("{}/{} {}", r.repo_owner, r.repo_name, r.tag_name))
            .collect();
        debug!("Filtered pre-releases: {:?}", filtered);
    }
    (stable, prerelease)
}
