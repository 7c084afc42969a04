pub mod error;
pub mod extract;
pub mod http;
pub mod lookup;
pub mod normalize;
pub mod orchestrator;
pub mod provider;
pub mod store;
pub mod types;

pub use error::{ConfigError, RunError, ScrapeError, StoreError, TransportError};
pub use extract::{extract_best, Extraction, ExtractionMiss};
pub use http::{
    FetchRequest, HttpClient, MockClient, MockResponse, RateLimiter, ReqwestClient,
    ResilientFetcher, RetryPolicy,
};
pub use normalize::{clean, CleanedDescription};
pub use orchestrator::{
    BulkOptions, BulkScraper, DescriptionSync, ItemOutcome, ItemResult, RunStats, ScrapeStrategy,
    SkipPolicy, SkipReason, SyncOptions,
};
pub use store::{GraphqlStore, MemoryStore, MetadataStore};
pub use types::{ItemKind, ItemUpdate, ScrapeItem, ScrapeMode, ScrapedData, StoreTag, Strategy};
