//! Stash-style GraphQL client.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::http::{FetchRequest, ResilientFetcher};
use crate::types::{
    ItemKind, ItemUpdate, KindFields, ScrapeItem, ScrapeMode, ScrapedData, ScrapedEntity,
    StoreTag, Strategy, TagRef,
};

use super::{merged_tag_ids, queries, EntityKind, ItemPage, MetadataStore};

/// Which file timestamp date filters compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampKind {
    #[default]
    Mtime,
    Ctime,
}

/// A file's modification or change time in local time.
///
/// `None` when the file is missing or the platform lacks the timestamp.
pub fn file_timestamp(path: &Path, kind: TimestampKind) -> Option<NaiveDateTime> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no file timestamp");
            return None;
        }
    };

    match kind {
        TimestampKind::Mtime => metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Local>::from(t).naive_local()),
        TimestampKind::Ctime => change_time(&metadata),
    }
}

#[cfg(unix)]
fn change_time(metadata: &std::fs::Metadata) -> Option<NaiveDateTime> {
    use std::os::unix::fs::MetadataExt;
    DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)
        .map(|t| t.with_timezone(&Local).naive_local())
}

#[cfg(not(unix))]
fn change_time(metadata: &std::fs::Metadata) -> Option<NaiveDateTime> {
    metadata
        .created()
        .ok()
        .map(|t| DateTime::<Local>::from(t).naive_local())
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlMessage>,
}

#[derive(Deserialize)]
struct GraphqlMessage {
    message: String,
}

#[derive(Deserialize)]
struct WireScraper {
    id: String,
    name: String,
    scene: Option<WireScrapeSupport>,
    image: Option<WireScrapeSupport>,
}

#[derive(Deserialize)]
struct WireScrapeSupport {
    #[serde(default)]
    supported_scrapes: Vec<ScrapeMode>,
}

#[derive(Deserialize)]
struct WireItemList {
    #[serde(default)]
    count: usize,
    #[serde(default, alias = "images", alias = "scenes")]
    items: Vec<WireItem>,
}

#[derive(Deserialize)]
struct WireItem {
    id: String,
    title: Option<String>,
    #[serde(default)]
    files: Vec<WireFile>,
    #[serde(default)]
    tags: Vec<TagRef>,
    #[serde(default)]
    organized: bool,
}

#[derive(Deserialize)]
struct WireFile {
    path: Option<String>,
    #[serde(default)]
    fingerprints: Vec<WireFingerprint>,
}

#[derive(Deserialize)]
struct WireFingerprint {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Deserialize)]
struct WireScraped {
    title: Option<String>,
    code: Option<String>,
    details: Option<String>,
    director: Option<String>,
    photographer: Option<String>,
    #[serde(default)]
    urls: Option<Vec<String>>,
    date: Option<String>,
    #[serde(default)]
    tags: Option<Vec<ScrapedEntity>>,
    #[serde(default)]
    performers: Option<Vec<ScrapedEntity>>,
    studio: Option<ScrapedEntity>,
}

impl WireScraped {
    fn into_scraped(self, kind: ItemKind) -> ScrapedData {
        let kind_fields = match kind {
            ItemKind::Scene => KindFields::Scene {
                director: self.director,
            },
            ItemKind::Image => KindFields::Image {
                photographer: self.photographer,
            },
        };
        ScrapedData {
            title: self.title,
            code: self.code,
            details: self.details,
            date: self.date,
            urls: self.urls.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            performers: self.performers.unwrap_or_default(),
            studio: self.studio,
            kind_fields,
        }
    }
}

#[derive(Deserialize)]
struct WireEntity {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct WireTagList {
    #[serde(default)]
    tags: Vec<StoreTag>,
}

/// Take `data[field]` out of a response object.
fn field<T: DeserializeOwned>(mut data: Value, name: &str) -> Result<T, StoreError> {
    let value = data.get_mut(name).map(Value::take).unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| StoreError::Decode(format!("{name}: {e}")))
}

pub struct GraphqlStore {
    fetcher: Arc<ResilientFetcher>,
    /// Used for scraper runs instead of `fetcher` when set.
    scrape_fetcher: Option<Arc<ResilientFetcher>>,
    endpoint: String,
    api_key: Option<String>,
    timestamps: Option<TimestampKind>,
}

impl GraphqlStore {
    pub fn new(fetcher: Arc<ResilientFetcher>, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            scrape_fetcher: None,
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.is_empty()),
            timestamps: None,
        }
    }

    /// Read this file timestamp for every listed item.
    pub fn with_timestamps(mut self, kind: TimestampKind) -> Self {
        self.timestamps = Some(kind);
        self
    }

    /// Send scrape requests through their own fetcher, typically one sharing
    /// the run's rate limiter, while lookups and updates stay unthrottled.
    pub fn with_scrape_fetcher(mut self, fetcher: Arc<ResilientFetcher>) -> Self {
        self.scrape_fetcher = Some(fetcher);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, StoreError> {
        self.execute_with(&self.fetcher, query, variables).await
    }

    async fn execute_with(
        &self,
        fetcher: &ResilientFetcher,
        query: &str,
        variables: Value,
    ) -> Result<Value, StoreError> {
        let mut payload = json!({ "query": query });
        if !variables.is_null() {
            payload["variables"] = variables;
        }

        let mut request = FetchRequest::post_json(self.endpoint.as_str(), payload)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("ApiKey", key.as_str());
        }

        tracing::debug!(query = %query.trim().chars().take(100).collect::<String>(), "executing GraphQL");
        let body = fetcher.fetch(&request).await.into_text()?;
        let envelope: Envelope<Value> =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
            let joined = messages.join("; ");
            tracing::error!(errors = %joined, "GraphQL errors");
            return Err(StoreError::GraphQl(joined));
        }
        Ok(envelope.data.unwrap_or(Value::Null))
    }

    fn to_item(&self, kind: ItemKind, wire: WireItem) -> ScrapeItem {
        let primary = wire.files.into_iter().next();
        let (path, checksum) = match primary {
            Some(file) => {
                let md5 = file
                    .fingerprints
                    .into_iter()
                    .find(|fp| fp.kind == "md5")
                    .map(|fp| fp.value);
                (file.path, md5)
            }
            None => (None, None),
        };

        let added_at = match (self.timestamps, path.as_deref()) {
            (Some(ts), Some(p)) => file_timestamp(Path::new(p), ts),
            _ => None,
        };

        ScrapeItem {
            id: wire.id,
            kind,
            title: wire.title,
            path,
            checksum,
            tags: wire.tags,
            organized: wire.organized,
            added_at,
        }
    }
}

#[async_trait]
impl MetadataStore for GraphqlStore {
    async fn test_connection(&self) -> Result<(), StoreError> {
        self.execute(queries::SYSTEM_STATUS, Value::Null).await?;
        Ok(())
    }

    async fn list_strategies(&self, kind: ItemKind) -> Result<Vec<Strategy>, StoreError> {
        let data = self
            .execute(
                queries::LIST_SCRAPERS,
                json!({ "types": [kind.content_type()] }),
            )
            .await?;
        let scrapers: Vec<WireScraper> = field(data, "listScrapers")?;

        Ok(scrapers
            .into_iter()
            .filter_map(|s| {
                let support = match kind {
                    ItemKind::Scene => s.scene,
                    ItemKind::Image => s.image,
                }?;
                (!support.supported_scrapes.is_empty()).then(|| {
                    Strategy::new(s.id, s.name, &support.supported_scrapes)
                })
            })
            .collect())
    }

    async fn find_items(
        &self,
        kind: ItemKind,
        page: u32,
        per_page: u32,
        organized: Option<bool>,
    ) -> Result<ItemPage, StoreError> {
        let (op, filter_var) = match kind {
            ItemKind::Image => ("findImages", "image_filter"),
            ItemKind::Scene => ("findScenes", "scene_filter"),
        };
        let item_filter = organized.map_or(Value::Null, |o| json!({ "organized": o }));
        let mut variables = json!({
            "filter": { "page": page, "per_page": per_page, "sort": "id", "direction": "ASC" },
        });
        variables[filter_var] = item_filter;

        let data = self.execute(&queries::find_items(kind), variables).await?;
        let list: WireItemList = field(data, op)?;
        Ok(ItemPage {
            count: list.count,
            items: list
                .items
                .into_iter()
                .map(|wire| self.to_item(kind, wire))
                .collect(),
        })
    }

    async fn scrape_item(
        &self,
        item: &ScrapeItem,
        strategy_id: &str,
    ) -> Result<Option<ScrapedData>, StoreError> {
        let (op, input) = match item.kind {
            ItemKind::Image => ("scrapeSingleImage", json!({ "image_id": item.id })),
            ItemKind::Scene => ("scrapeSingleScene", json!({ "scene_id": item.id })),
        };
        let variables = json!({ "source": { "scraper_id": strategy_id }, "input": input });

        let fetcher = self.scrape_fetcher.as_ref().unwrap_or(&self.fetcher);
        let data = self
            .execute_with(fetcher, &queries::scrape_single(item.kind), variables)
            .await?;
        let results: Option<Vec<WireScraped>> = field(data, op)?;
        Ok(results
            .and_then(|r| r.into_iter().next())
            .map(|r| r.into_scraped(item.kind)))
    }

    async fn find_entity(&self, kind: EntityKind, name: &str) -> Result<Option<String>, StoreError> {
        let (query, op, list) = queries::find_entity(kind);
        let data = self
            .execute(&query, json!({ "filter": { "q": name, "per_page": 1 } }))
            .await?;
        let found: Value = field(data, op)?;
        let entities: Vec<WireEntity> = field(found, list)?;

        let lower = name.to_lowercase();
        Ok(entities
            .into_iter()
            .find(|e| e.name.to_lowercase() == lower)
            .map(|e| e.id))
    }

    async fn create_entity(&self, kind: EntityKind, name: &str) -> Result<String, StoreError> {
        let (query, op) = queries::create_entity(kind);
        let data = self
            .execute(&query, json!({ "input": { "name": name } }))
            .await
            .map_err(|e| StoreError::Mutation(format!("create {kind} '{name}': {e}")))?;
        let created: Option<WireEntity> = field(data, op)?;
        created
            .map(|e| e.id)
            .ok_or_else(|| StoreError::Mutation(format!("create {kind} '{name}' returned nothing")))
    }

    async fn update_item(&self, item: &ScrapeItem, update: &ItemUpdate) -> Result<(), StoreError> {
        let mut update = update.clone();
        if let Some(ids) = &update.tag_ids {
            update.tag_ids = Some(merged_tag_ids(item, ids));
        }

        let mut input = serde_json::to_value(&update).map_err(|e| StoreError::Decode(e.to_string()))?;
        input["id"] = json!(item.id);

        let (query, _) = queries::update_item(item.kind);
        self.execute(&query, json!({ "input": input }))
            .await
            .map_err(|e| StoreError::Mutation(format!("{} {}: {e}", item.kind, item.id)))?;
        Ok(())
    }

    async fn all_tags(&self) -> Result<Vec<StoreTag>, StoreError> {
        let data = self.execute(queries::ALL_TAGS, Value::Null).await?;
        let list: WireTagList = field(data, "findTags")?;
        Ok(list.tags)
    }

    async fn update_tag_description(
        &self,
        tag_id: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        self.execute(
            queries::TAG_UPDATE,
            json!({ "input": { "id": tag_id, "description": description } }),
        )
        .await
        .map_err(|e| StoreError::Mutation(format!("tag {tag_id}: {e}")))?;
        Ok(())
    }
}
