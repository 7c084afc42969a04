//! Copying wiki descriptions onto store tags.

use std::sync::Arc;

use serde::Serialize;

use crate::error::StoreError;
use crate::provider::wiki::{truncate, WikiScraper};
use crate::store::{select_tags_by_name, MetadataStore};
use crate::types::StoreTag;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Also look up tags that already have a description.
    pub include_existing: bool,
    /// Overwrite existing descriptions.
    pub force: bool,
}

impl SyncOptions {
    fn skips_described(&self) -> bool {
        !self.include_existing && !self.force
    }
}

/// Outcome for one tag.
#[derive(Debug, Clone, Serialize)]
pub struct TagSyncResult {
    pub tag_name: String,
    pub tag_id: String,
    pub updated: bool,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub error: Option<String>,
    #[serde(serialize_with = "preview")]
    pub wiki_description: Option<String>,
}

/// First 200 characters in JSON output.
fn preview<S: serde::Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(text) => s.serialize_some(truncate(text, 200)),
        None => s.serialize_none(),
    }
}

impl TagSyncResult {
    fn new(tag: &StoreTag) -> Self {
        Self {
            tag_name: tag.name.clone(),
            tag_id: tag.id.clone(),
            updated: false,
            skipped: false,
            skip_reason: None,
            error: None,
            wiki_description: None,
        }
    }
}

pub struct DescriptionSync {
    store: Arc<dyn MetadataStore>,
    wiki: WikiScraper,
    options: SyncOptions,
    stats: SyncStats,
}

impl DescriptionSync {
    pub fn new(store: Arc<dyn MetadataStore>, wiki: WikiScraper, options: SyncOptions) -> Self {
        Self {
            store,
            wiki,
            options,
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Every store tag, or those named in `names`, cut to `limit`.
    pub async fn select_tags(
        &self,
        names: Option<&[String]>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreTag>, StoreError> {
        let all = self.store.all_tags().await?;
        let mut tags = match names {
            Some(names) => select_tags_by_name(all, names).0,
            None => all,
        };
        if let Some(limit) = limit {
            tags.truncate(limit);
        }
        Ok(tags)
    }

    pub async fn sync_tag(&mut self, tag: &StoreTag) -> TagSyncResult {
        self.stats.total += 1;
        let mut result = TagSyncResult::new(tag);

        if self.options.skips_described() && tag.has_description() {
            tracing::info!(tag = %tag.name, "skipping, already has description");
            self.stats.skipped += 1;
            result.skipped = true;
            result.skip_reason = Some("Already has description".to_string());
            return result;
        }

        let description = match self.wiki.scrape_tag(&tag.name).await {
            Ok(extraction) => extraction.description.into_string(),
            Err(e) => {
                tracing::info!(tag = %tag.name, error = %e, "no wiki description");
                self.stats.not_found += 1;
                result.skipped = true;
                result.skip_reason = Some(e.to_string());
                return result;
            }
        };

        if self.options.dry_run {
            tracing::info!(
                tag = %tag.name,
                "[DRY RUN] Would update with: {}...",
                truncate(&description, 100)
            );
            self.stats.updated += 1;
            result.updated = true;
            result.wiki_description = Some(description);
            return result;
        }

        match self.store.update_tag_description(&tag.id, &description).await {
            Ok(()) => {
                tracing::info!(tag = %tag.name, "updated with wiki description");
                self.stats.updated += 1;
                result.updated = true;
            }
            Err(e) => {
                tracing::error!(tag = %tag.name, error = %e, "failed to update tag");
                self.stats.errors += 1;
                result.error = Some(format!("Failed to update in store: {e}"));
            }
        }
        result.wiki_description = Some(description);
        result
    }

    pub async fn sync_tags(&mut self, tags: &[StoreTag]) -> Vec<TagSyncResult> {
        let mut results = Vec::with_capacity(tags.len());
        for (i, tag) in tags.iter().enumerate() {
            tracing::info!("Processing tag {}/{}: '{}'", i + 1, tags.len(), tag.name);
            results.push(self.sync_tag(tag).await);
        }
        results
    }
}
