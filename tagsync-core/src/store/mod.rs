//! The metadata store that owns items, tags, performers and studios.
//!
//! [`MetadataStore`] is the seam the orchestrators talk through;
//! [`GraphqlStore`] is the real client and [`MemoryStore`] the in-process fake.

mod graphql;
mod memory;
mod queries;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{ItemKind, ItemUpdate, ScrapeItem, ScrapedData, StoreTag, Strategy};

pub use graphql::{file_timestamp, GraphqlStore, TimestampKind};
pub use memory::MemoryStore;

/// Items are listed this many at a time.
pub const PAGE_SIZE: u32 = 50;

/// Named entities an item can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Tag,
    Performer,
    Studio,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::Performer => "performer",
            EntityKind::Studio => "studio",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of items plus the store's total count for the query.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<ScrapeItem>,
    pub count: usize,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn test_connection(&self) -> Result<(), StoreError>;

    /// Scrapers installed in the store for this kind of item.
    async fn list_strategies(&self, kind: ItemKind) -> Result<Vec<Strategy>, StoreError>;

    /// A page of items sorted by id ascending. Pages start at 1.
    ///
    /// `organized` filters on the organized flag when set.
    async fn find_items(
        &self,
        kind: ItemKind,
        page: u32,
        per_page: u32,
        organized: Option<bool>,
    ) -> Result<ItemPage, StoreError>;

    /// Run an installed scraper against an item. The first result wins.
    async fn scrape_item(
        &self,
        item: &ScrapeItem,
        strategy_id: &str,
    ) -> Result<Option<ScrapedData>, StoreError>;

    /// Id of the entity with this exact name, compared case-insensitively.
    async fn find_entity(&self, kind: EntityKind, name: &str) -> Result<Option<String>, StoreError>;

    async fn create_entity(&self, kind: EntityKind, name: &str) -> Result<String, StoreError>;

    /// Write fields to an item. Tag ids are merged with the item's existing
    /// tags.
    async fn update_item(&self, item: &ScrapeItem, update: &ItemUpdate) -> Result<(), StoreError>;

    async fn all_tags(&self) -> Result<Vec<StoreTag>, StoreError>;

    async fn update_tag_description(&self, tag_id: &str, description: &str)
        -> Result<(), StoreError>;
}

/// Find an entity by name, creating it when absent.
///
/// Returns the id and whether it was created.
pub async fn get_or_create(
    store: &dyn MetadataStore,
    kind: EntityKind,
    name: &str,
) -> Result<(String, bool), StoreError> {
    if let Some(id) = store.find_entity(kind, name).await? {
        return Ok((id, false));
    }
    tracing::debug!(%kind, name, "creating entity");
    let id = store.create_entity(kind, name).await?;
    Ok((id, true))
}

/// The item's current tag ids followed by `new_ids`, without duplicates.
pub fn merged_tag_ids(item: &ScrapeItem, new_ids: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(item.tags.len() + new_ids.len());
    for id in item.tags.iter().map(|t| &t.id).chain(new_ids) {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}

/// Tags whose names match `names` case-insensitively, in store order.
///
/// Names with no match are logged and returned.
pub fn select_tags_by_name(tags: Vec<StoreTag>, names: &[String]) -> (Vec<StoreTag>, Vec<String>) {
    let wanted: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let selected: Vec<StoreTag> = tags
        .into_iter()
        .filter(|t| wanted.contains(&t.name.to_lowercase()))
        .collect();

    let missing: Vec<String> = names
        .iter()
        .filter(|n| {
            let lower = n.to_lowercase();
            !selected.iter().any(|t| t.name.to_lowercase() == lower)
        })
        .cloned()
        .collect();
    if !missing.is_empty() {
        tracing::warn!(?missing, "tags not found in store");
    }

    (selected, missing)
}
