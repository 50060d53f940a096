pub mod baseline;
pub mod defs;
pub mod empty;

pub use baseline::BaselineSummarizer;
pub use defs::{IsoWeek, NewsItem, Newsletter, Release, Summarizer, WeekInput};
pub use empty::EmptySummarizer;
