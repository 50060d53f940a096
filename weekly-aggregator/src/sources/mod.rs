pub mod discussion;
pub mod github_releases;
pub mod rss_feed;
pub mod scrape;

pub use discussion::DiscussionSearch;
pub use github_releases::GithubReleases;
pub use rss_feed::RssFeedSource;
pub use scrape::ScrapeSource;
