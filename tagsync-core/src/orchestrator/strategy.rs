//! Scraping strategies and the order they are tried in.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConfigError, ScrapeError, StoreError};
use crate::store::MetadataStore;
use crate::types::{ScrapeItem, ScrapeMode, ScrapedData, Strategy};

/// Strategy names containing any of these run after every specific one.
pub const GENERIC_KEYWORDS: &[&str] = &["auto", "generic", "fallback", "default", "universal"];

/// One named way of producing metadata for an item.
///
/// `Ok(None)` means the strategy had nothing for this item. Errors are
/// recorded by the orchestrator and never abort a batch.
#[async_trait]
pub trait ScrapeStrategy: Send + Sync {
    fn info(&self) -> &Strategy;

    async fn scrape(&self, item: &ScrapeItem) -> Result<Option<ScrapedData>, ScrapeError>;

    fn name(&self) -> &str {
        &self.info().name
    }
}

impl From<StoreError> for ScrapeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport(inner) => inner,
            StoreError::Mutation(msg) => ScrapeError::UpstreamMutationFailure(msg),
            StoreError::GraphQl(msg) | StoreError::Decode(msg) => ScrapeError::ParseFailure(msg),
        }
    }
}

/// A scraper installed in the metadata store.
pub struct StoreStrategy {
    info: Strategy,
    store: Arc<dyn MetadataStore>,
}

impl StoreStrategy {
    pub fn new(info: Strategy, store: Arc<dyn MetadataStore>) -> Self {
        Self { info, store }
    }
}

#[async_trait]
impl ScrapeStrategy for StoreStrategy {
    fn info(&self) -> &Strategy {
        &self.info
    }

    async fn scrape(&self, item: &ScrapeItem) -> Result<Option<ScrapedData>, ScrapeError> {
        Ok(self.store.scrape_item(item, &self.info.id).await?)
    }
}

pub fn is_generic(name: &str) -> bool {
    let lower = name.to_lowercase();
    GENERIC_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Order strategies for the try loop.
///
/// A requested strategy (matched case-insensitively) goes first whether or
/// not it is generic, then the remaining specific strategies, then the
/// generic ones. Relative order is otherwise preserved.
pub fn order_strategies<T>(
    strategies: Vec<T>,
    requested: Option<&str>,
    mode: ScrapeMode,
    name_of: impl Fn(&T) -> &str,
) -> Result<Vec<T>, ConfigError> {
    let mut primary = None;
    let mut specific = Vec::new();
    let mut generic = Vec::new();
    let mut available = Vec::new();

    for strategy in strategies {
        let name = name_of(&strategy);
        available.push(name.to_string());
        let is_requested = requested.is_some_and(|r| r.eq_ignore_ascii_case(name));
        if is_requested && primary.is_none() {
            primary = Some(strategy);
        } else if is_generic(name) {
            generic.push(strategy);
        } else {
            specific.push(strategy);
        }
    }

    if let Some(requested) = requested {
        if primary.is_none() {
            return Err(ConfigError::UnknownStrategy {
                requested: requested.to_string(),
                mode: mode.as_str().to_string(),
                available,
            });
        }
    }

    Ok(primary.into_iter().chain(specific).chain(generic).collect())
}
