//! Bulk scrape runs: page through a kind of item, try strategies in order and
//! write whatever the first useful one returns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

use crate::error::{RunError, ScrapeError, StoreError};
use crate::store::{get_or_create, EntityKind, MetadataStore, PAGE_SIZE};
use crate::types::{ItemKind, ItemUpdate, KindFields, ScrapeItem, ScrapeMode, ScrapedData, ScrapedEntity};

use super::skip::{SkipPolicy, SkipReason};
use super::stats::{format_duration, RunStats};
use super::strategy::{is_generic, order_strategies, ScrapeStrategy, StoreStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success,
    Skipped(SkipReason),
    Failed(String),
}

/// What happened to one item.
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item_id: String,
    pub kind: ItemKind,
    pub path: Option<String>,
    pub title: Option<String>,
    /// The strategy that succeeded, otherwise the primary one.
    pub strategy: String,
    pub outcome: ItemOutcome,
    pub fallback_used: bool,
    pub tags_created: Vec<String>,
    pub tags_added: Vec<String>,
    pub performers_created: Vec<String>,
    pub performers_added: Vec<String>,
    pub studio_created: Option<String>,
    pub studio_added: Option<String>,
    pub fields_updated: Vec<String>,
    pub scraped: Option<ScrapedData>,
    pub elapsed: Duration,
    pub timestamp: NaiveDateTime,
}

impl ItemResult {
    pub fn new(item_id: &str, kind: ItemKind, strategy: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            kind,
            path: None,
            title: None,
            strategy: strategy.to_string(),
            outcome: ItemOutcome::Failed(String::new()),
            fallback_used: false,
            tags_created: Vec::new(),
            tags_added: Vec::new(),
            performers_created: Vec::new(),
            performers_added: Vec::new(),
            studio_created: None,
            studio_added: None,
            fields_updated: Vec::new(),
            scraped: None,
            elapsed: Duration::ZERO,
            timestamp: Local::now().naive_local(),
        }
    }

    fn for_item(item: &ScrapeItem, strategy: &str) -> Self {
        Self {
            path: item.path.clone(),
            title: item.title.clone(),
            ..Self::new(&item.id, item.kind, strategy)
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ItemOutcome::Success
    }

    /// Short human summary of what was written.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.tags_added.is_empty() {
            parts.push(format!("{} tags", self.tags_added.len()));
        }
        if !self.performers_added.is_empty() {
            parts.push(format!("{} performers", self.performers_added.len()));
        }
        if let Some(studio) = &self.studio_added {
            parts.push(format!("studio: {studio}"));
        }
        for field in ["title", "details"] {
            if self.fields_updated.iter().any(|f| f == field) {
                parts.push(field.to_string());
            }
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    /// Resolve and report, but create and write nothing.
    pub dry_run: bool,
    /// Fall through to later strategies when the primary has nothing.
    pub try_all: bool,
    pub skip: SkipPolicy,
}

/// Store ids and bookkeeping for one strategy's data.
#[derive(Default)]
struct Resolved {
    update: ItemUpdate,
    tags_created: Vec<String>,
    tags_added: Vec<String>,
    performers_created: Vec<String>,
    performers_added: Vec<String>,
    studio_created: Option<String>,
    studio_added: Option<String>,
}

/// Where an entity id came from.
enum EntityRef {
    Existing(String),
    Created(String),
    /// Dry run: would have been looked up or created.
    Planned,
}

pub struct BulkScraper {
    store: Arc<dyn MetadataStore>,
    builtins: Vec<Arc<dyn ScrapeStrategy>>,
    options: BulkOptions,
    stats: RunStats,
}

impl BulkScraper {
    /// Strategies pace themselves: their fetchers share the run's rate limiter.
    pub fn new(store: Arc<dyn MetadataStore>, options: BulkOptions) -> Self {
        Self {
            store,
            builtins: Vec::new(),
            options,
            stats: RunStats::new(),
        }
    }

    /// Offer a strategy alongside the store's installed scrapers.
    pub fn with_strategy(mut self, strategy: Arc<dyn ScrapeStrategy>) -> Self {
        self.builtins.push(strategy);
        self
    }

    pub fn options(&self) -> &BulkOptions {
        &self.options
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Every strategy for this kind: the store's scrapers, then built-ins.
    pub async fn strategies(&self, kind: ItemKind) -> Result<Vec<Arc<dyn ScrapeStrategy>>, StoreError> {
        let installed = self.store.list_strategies(kind).await?;
        let mut all: Vec<Arc<dyn ScrapeStrategy>> = installed
            .into_iter()
            .map(|info| Arc::new(StoreStrategy::new(info, self.store.clone())) as Arc<dyn ScrapeStrategy>)
            .collect();
        all.extend(self.builtins.iter().cloned());
        Ok(all)
    }

    /// Fragment-capable strategies in try order.
    pub async fn plan(
        &self,
        kind: ItemKind,
        requested: Option<&str>,
    ) -> Result<Vec<Arc<dyn ScrapeStrategy>>, RunError> {
        let mode = ScrapeMode::Fragment;
        let usable: Vec<_> = self
            .strategies(kind)
            .await?
            .into_iter()
            .filter(|s| s.info().supports(mode))
            .collect();
        if usable.is_empty() {
            return Err(RunError::NoStrategies {
                kind: kind.to_string(),
                mode: mode.as_str().to_string(),
            });
        }

        let ordered = order_strategies(usable, requested, mode, |s| s.name())?;
        if let Some(primary) = ordered.first() {
            tracing::info!(strategy = primary.name(), modes = ?primary.info().supported_modes, "primary strategy");
        }
        if self.options.try_all && ordered.len() > 1 {
            let fallbacks: Vec<&str> = ordered[1..].iter().map(|s| s.name()).collect();
            let generic: Vec<&str> = fallbacks.iter().copied().filter(|n| is_generic(n)).collect();
            tracing::info!(?fallbacks, "fallback strategies enabled");
            if !generic.is_empty() {
                tracing::info!(?generic, "generic strategies deprioritized to end");
            }
        }
        Ok(ordered)
    }

    /// Scrape every item of `kind`, page by page, stopping after `limit`.
    ///
    /// Statistics start fresh for each call.
    pub async fn run(
        &mut self,
        kind: ItemKind,
        requested: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ItemResult>, RunError> {
        self.stats = RunStats::new();
        let strategies = self.plan(kind, requested).await?;
        let organized = self.options.skip.skip_organized.then_some(false);

        let mut results = Vec::new();
        let mut page = 1;
        let mut fetched = 0usize;

        loop {
            let batch = self
                .store
                .find_items(kind, page, PAGE_SIZE, organized)
                .await?;
            if page == 1 {
                self.stats.total = limit.map_or(batch.count, |l| l.min(batch.count));
                tracing::info!(found = batch.count, processing = self.stats.total, %kind, "listed items");
            }
            if batch.items.is_empty() {
                break;
            }

            let take = limit.map_or(batch.items.len(), |l| {
                l.saturating_sub(fetched).min(batch.items.len())
            });
            results.extend(self.process_batch(&batch.items[..take], &strategies).await);
            fetched += take;

            if limit.is_some_and(|l| fetched >= l) || batch.items.len() < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        Ok(results)
    }

    /// Process items in order, folding each result into the run statistics.
    pub async fn process_batch(
        &mut self,
        items: &[ScrapeItem],
        strategies: &[Arc<dyn ScrapeStrategy>],
    ) -> Vec<ItemResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let position = self.stats.processed + 1;
            let total = self.stats.total.max(position);
            tracing::info!(
                "Processing {} {}/{} ({:.1}%) - ETA: {}",
                item.kind,
                position,
                total,
                position as f64 / total as f64 * 100.0,
                self.stats.eta().map_or_else(|| "unknown".to_string(), format_duration),
            );

            let result = self.process_item(item, strategies).await;
            self.stats.record(&result);
            results.push(result);
        }
        results
    }

    /// Skip checks, then the try loop, then the store update.
    pub async fn process_item(
        &self,
        item: &ScrapeItem,
        strategies: &[Arc<dyn ScrapeStrategy>],
    ) -> ItemResult {
        let started = Instant::now();
        let Some(primary) = strategies.first() else {
            let mut result = ItemResult::for_item(item, "");
            result.outcome = ItemOutcome::Failed("no strategies available".to_string());
            return result;
        };

        let mut result = ItemResult::for_item(item, primary.name());
        let outcome = self.try_strategies(item, strategies, &mut result).await;
        result.outcome = outcome;
        result.elapsed = started.elapsed();
        result
    }

    async fn try_strategies(
        &self,
        item: &ScrapeItem,
        strategies: &[Arc<dyn ScrapeStrategy>],
        result: &mut ItemResult,
    ) -> ItemOutcome {
        if let Some(reason) = self.options.skip.check(item) {
            tracing::debug!(item = %item.id, %reason, "skipping");
            return ItemOutcome::Skipped(reason);
        }

        let to_try = if self.options.try_all {
            strategies
        } else {
            &strategies[..1]
        };
        let mut saw_useless = false;
        let mut last_error: Option<String> = None;

        for (index, strategy) in to_try.iter().enumerate() {
            tracing::debug!(kind = %item.kind, item = %item.id, strategy = strategy.name(), "scraping");

            let data = match strategy.scrape(item).await {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::debug!(strategy = strategy.name(), "returned no data");
                    continue;
                }
                Err(e) => {
                    tracing::error!(kind = %item.kind, item = %item.id, strategy = strategy.name(), error = %e, "scrape failed");
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            if !data.has_useful_data() {
                tracing::debug!(strategy = strategy.name(), "returned no useful data");
                saw_useless = true;
                continue;
            }

            let resolved = self.resolve(item, &data).await;

            if !self.options.dry_run {
                if resolved.update.is_empty() {
                    tracing::warn!(strategy = strategy.name(), "no valid metadata to update");
                    last_error = Some("no valid metadata from any strategy".to_string());
                    continue;
                }
                if let Err(e) = self.store.update_item(item, &resolved.update).await {
                    tracing::error!(kind = %item.kind, item = %item.id, error = %e, "failed to update item");
                    return ItemOutcome::Failed(
                        ScrapeError::UpstreamMutationFailure(e.to_string()).to_string(),
                    );
                }
            }

            result.strategy = strategy.name().to_string();
            result.fallback_used = index > 0;
            result.fields_updated = resolved
                .update
                .field_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            result.tags_created = resolved.tags_created;
            result.tags_added = resolved.tags_added;
            result.performers_created = resolved.performers_created;
            result.performers_added = resolved.performers_added;
            result.studio_created = resolved.studio_created;
            result.studio_added = resolved.studio_added;
            result.scraped = Some(data);

            if result.fallback_used {
                tracing::info!(strategy = strategy.name(), kind = %item.kind, item = %item.id, "fallback strategy succeeded");
            }
            let prefix = if self.options.dry_run { "[DRY RUN] Would update" } else { "Updated" };
            tracing::info!("{prefix} {} {} from {}: {}", item.kind, item.id, result.strategy, result.summary());
            return ItemOutcome::Success;
        }

        if saw_useless {
            return ItemOutcome::Skipped(SkipReason::NoUsefulData);
        }
        ItemOutcome::Failed(match last_error {
            Some(e) => format!("no data returned from any strategy (last error: {e})"),
            None => "no data returned from any strategy".to_string(),
        })
    }

    async fn entity_ref(&self, kind: EntityKind, entity: &ScrapedEntity) -> Option<EntityRef> {
        if let Some(id) = entity.stored_id.as_ref().filter(|id| !id.is_empty()) {
            return Some(EntityRef::Existing(id.clone()));
        }
        if self.options.dry_run {
            return Some(EntityRef::Planned);
        }
        match get_or_create(self.store.as_ref(), kind, &entity.name).await {
            Ok((id, true)) => {
                tracing::debug!(%kind, name = %entity.name, "created");
                Some(EntityRef::Created(id))
            }
            Ok((id, false)) => Some(EntityRef::Existing(id)),
            Err(e) => {
                tracing::warn!(%kind, name = %entity.name, error = %e, "failed to resolve entity");
                None
            }
        }
    }

    /// Resolve scraped entities to store ids and collect the field update.
    async fn resolve(&self, item: &ScrapeItem, data: &ScrapedData) -> Resolved {
        let mut out = Resolved::default();

        if !data.tags.is_empty() {
            let mut ids = Vec::new();
            for tag in &data.tags {
                match self.entity_ref(EntityKind::Tag, tag).await {
                    Some(EntityRef::Existing(id)) => ids.push(id),
                    Some(EntityRef::Created(id)) => {
                        ids.push(id);
                        out.tags_created.push(tag.name.clone());
                    }
                    Some(EntityRef::Planned) => out.tags_created.push(tag.name.clone()),
                    None => continue,
                }
                out.tags_added.push(tag.name.clone());
            }
            if !ids.is_empty() || self.options.dry_run {
                out.update.tag_ids = Some(ids);
            }
        }

        if !data.performers.is_empty() {
            let mut ids = Vec::new();
            for performer in &data.performers {
                match self.entity_ref(EntityKind::Performer, performer).await {
                    Some(EntityRef::Existing(id)) => ids.push(id),
                    Some(EntityRef::Created(id)) => {
                        ids.push(id);
                        out.performers_created.push(performer.name.clone());
                    }
                    Some(EntityRef::Planned) => out.performers_created.push(performer.name.clone()),
                    None => continue,
                }
                out.performers_added.push(performer.name.clone());
            }
            if !ids.is_empty() || self.options.dry_run {
                out.update.performer_ids = Some(ids);
            }
        }

        if let Some(studio) = &data.studio {
            match self.entity_ref(EntityKind::Studio, studio).await {
                Some(EntityRef::Existing(id)) => {
                    out.update.studio_id = Some(id);
                    out.studio_added = Some(studio.name.clone());
                }
                Some(EntityRef::Created(id)) => {
                    out.update.studio_id = Some(id);
                    out.studio_created = Some(studio.name.clone());
                    out.studio_added = Some(studio.name.clone());
                }
                Some(EntityRef::Planned) => {
                    out.studio_created = Some(studio.name.clone());
                    out.studio_added = Some(studio.name.clone());
                }
                None => {}
            }
        }

        let present = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        out.update.title = present(&data.title);
        out.update.details = present(&data.details);
        out.update.date = present(&data.date);
        out.update.code = present(&data.code);
        if !data.urls.is_empty() {
            out.update.urls = Some(data.urls.clone());
        }
        match (&data.kind_fields, item.kind) {
            (KindFields::Scene { director }, ItemKind::Scene) => out.update.director = present(director),
            (KindFields::Image { photographer }, ItemKind::Image) => {
                out.update.photographer = present(photographer)
            }
            _ => {}
        }

        out
    }
}
