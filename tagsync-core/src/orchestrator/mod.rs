//! Bulk scraping runs and tag-description sync.

pub mod bulk;
pub mod descriptions;
pub mod skip;
pub mod stats;
pub mod strategy;

pub use bulk::{BulkOptions, BulkScraper, ItemOutcome, ItemResult};
pub use descriptions::{DescriptionSync, SyncOptions, SyncStats, TagSyncResult};
pub use skip::{parse_date, DateFilter, SkipPolicy, SkipReason};
pub use stats::{format_duration, RunStats};
pub use strategy::{is_generic, order_strategies, ScrapeStrategy, StoreStrategy, GENERIC_KEYWORDS};
