pub mod time_bucket;

pub use time_bucket::{backfill_windows, TimeWindow};
