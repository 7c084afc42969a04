//! Outbound HTTP: a mockable client seam, throttling and retrying fetches.
//!
//! Every provider and metadata-store request goes through a `ResilientFetcher`
//! so that rate limits and retry classification are applied uniformly.

pub(crate) mod charset;
mod client;
mod fetcher;
mod rate_limiter;

pub use client::{
    FetchRequest, HttpClient, Method, MockClient, MockResponse, RawResponse, ReqwestClient,
    ReqwestClientBuilder,
};
pub use fetcher::{FetchOutcome, FetchStatus, ResilientFetcher, RetryPolicy};
pub use rate_limiter::RateLimiter;
