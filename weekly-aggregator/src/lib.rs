pub mod aggregator;
pub mod aggregators;
pub mod config;
pub mod digest;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
pub mod sources;
pub mod state;
pub mod traits;
pub mod types;
pub mod utils;

pub use aggregators::{backfill_windows, TimeWindow};
pub use config::{NewsSourceConfig, RepositoryConfig};
pub use digest::WeekReport;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use pipeline::{PipelineOptions, WeeklyPipeline};
pub use state::RunStore;
pub use traits::{NewsSource, SourceKind};
pub use types::*;
