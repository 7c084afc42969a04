//! In-memory metadata store for tests and dry runs.
//!
//! Holds items, entities and canned scrape results, and records every update
//! so assertions can inspect what would have been written.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{ItemKind, ItemUpdate, ScrapeItem, ScrapedData, StoreTag, Strategy};

use super::{merged_tag_ids, EntityKind, ItemPage, MetadataStore};

#[derive(Default)]
struct State {
    items: Vec<ScrapeItem>,
    strategies: Vec<(ItemKind, Strategy)>,
    /// (strategy id, item id) -> result
    scrapes: HashMap<(String, String), ScrapedData>,
    entities: Vec<(EntityKind, String, String)>,
    tags: Vec<StoreTag>,
    updates: Vec<(String, ItemUpdate)>,
    next_id: u64,
    fail_updates: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_item(self, item: ScrapeItem) -> Self {
        self.state().items.push(item);
        self
    }

    pub fn with_strategy(self, kind: ItemKind, strategy: Strategy) -> Self {
        self.state().strategies.push((kind, strategy));
        self
    }

    /// Canned result for `strategy_id` scraping `item_id`.
    pub fn with_scrape(self, strategy_id: &str, item_id: &str, data: ScrapedData) -> Self {
        self.state()
            .scrapes
            .insert((strategy_id.to_string(), item_id.to_string()), data);
        self
    }

    pub fn with_entity(self, kind: EntityKind, id: &str, name: &str) -> Self {
        self.state()
            .entities
            .push((kind, id.to_string(), name.to_string()));
        self
    }

    /// A tag that is both a findable entity and a description-sync target.
    pub fn with_tag(self, id: &str, name: &str, description: Option<&str>) -> Self {
        self.state().tags.push(StoreTag {
            id: id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
        });
        self.with_entity(EntityKind::Tag, id, name)
    }

    /// Make every item update fail.
    pub fn failing_updates(self) -> Self {
        self.state().fail_updates = true;
        self
    }

    /// Item updates received so far, with tags already merged.
    pub fn updates(&self) -> Vec<(String, ItemUpdate)> {
        self.state().updates.clone()
    }

    /// Names of entities of `kind`, in creation order.
    pub fn entity_names(&self, kind: EntityKind) -> Vec<String> {
        self.state()
            .entities
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    pub fn tag_description(&self, tag_id: &str) -> Option<String> {
        self.state()
            .tags
            .iter()
            .find(|t| t.id == tag_id)
            .and_then(|t| t.description.clone())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_strategies(&self, kind: ItemKind) -> Result<Vec<Strategy>, StoreError> {
        Ok(self
            .state()
            .strategies
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn find_items(
        &self,
        kind: ItemKind,
        page: u32,
        per_page: u32,
        organized: Option<bool>,
    ) -> Result<ItemPage, StoreError> {
        let state = self.state();
        let matching: Vec<&ScrapeItem> = state
            .items
            .iter()
            .filter(|i| i.kind == kind)
            .filter(|i| organized.map_or(true, |o| i.organized == o))
            .collect();

        let start = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
        Ok(ItemPage {
            count: matching.len(),
            items: matching
                .into_iter()
                .skip(start)
                .take(per_page as usize)
                .cloned()
                .collect(),
        })
    }

    async fn scrape_item(
        &self,
        item: &ScrapeItem,
        strategy_id: &str,
    ) -> Result<Option<ScrapedData>, StoreError> {
        Ok(self
            .state()
            .scrapes
            .get(&(strategy_id.to_string(), item.id.clone()))
            .cloned())
    }

    async fn find_entity(&self, kind: EntityKind, name: &str) -> Result<Option<String>, StoreError> {
        let lower = name.to_lowercase();
        Ok(self
            .state()
            .entities
            .iter()
            .find(|(k, _, n)| *k == kind && n.to_lowercase() == lower)
            .map(|(_, id, _)| id.clone()))
    }

    async fn create_entity(&self, kind: EntityKind, name: &str) -> Result<String, StoreError> {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("{}-{}", kind.as_str(), state.next_id);
        state.entities.push((kind, id.clone(), name.to_string()));
        Ok(id)
    }

    async fn update_item(&self, item: &ScrapeItem, update: &ItemUpdate) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_updates {
            return Err(StoreError::Mutation(format!("{} {} rejected", item.kind, item.id)));
        }
        let mut update = update.clone();
        if let Some(ids) = &update.tag_ids {
            update.tag_ids = Some(merged_tag_ids(item, ids));
        }
        state.updates.push((item.id.clone(), update));
        Ok(())
    }

    async fn all_tags(&self) -> Result<Vec<StoreTag>, StoreError> {
        Ok(self.state().tags.clone())
    }

    async fn update_tag_description(
        &self,
        tag_id: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_updates {
            return Err(StoreError::Mutation(format!("tag {tag_id} rejected")));
        }
        match state.tags.iter_mut().find(|t| t.id == tag_id) {
            Some(tag) => {
                tag.description = Some(description.to_string());
                Ok(())
            }
            None => Err(StoreError::Mutation(format!("no tag {tag_id}"))),
        }
    }
}
