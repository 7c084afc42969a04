use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The two kinds of media record held by the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Image,
    Scene,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Image => "image",
            ItemKind::Scene => "scene",
        }
    }

    /// Content type name used by the store's scraper listing.
    pub fn content_type(&self) -> &'static str {
        match self {
            ItemKind::Image => "IMAGE",
            ItemKind::Scene => "SCENE",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a strategy can be invoked for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapeMode {
    Name,
    Fragment,
    Url,
    #[serde(other)]
    Other,
}

impl ScrapeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeMode::Name => "NAME",
            ScrapeMode::Fragment => "FRAGMENT",
            ScrapeMode::Url => "URL",
            ScrapeMode::Other => "OTHER",
        }
    }
}

/// A tag already attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    pub name: String,
}

/// A media record owned by the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: Option<String>,
    pub path: Option<String>,
    /// md5 fingerprint of the primary file, if the store computed one.
    pub checksum: Option<String>,
    pub tags: Vec<TagRef>,
    pub organized: bool,
    /// File timestamp, only populated when a date filter needs it.
    pub added_at: Option<NaiveDateTime>,
}

/// A named scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub supported_modes: BTreeSet<ScrapeMode>,
}

impl Strategy {
    pub fn new(id: impl Into<String>, name: impl Into<String>, modes: &[ScrapeMode]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supported_modes: modes.iter().copied().collect(),
        }
    }

    pub fn supports(&self, mode: ScrapeMode) -> bool {
        self.supported_modes.contains(&mode)
    }
}

/// A tag, performer or studio as returned by a scraper.
///
/// `stored_id` is set when the store already matched the name to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_id: Option<String>,
    pub name: String,
}

impl ScrapedEntity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            stored_id: None,
            name: name.into(),
        }
    }
}

/// Fields that only exist for one kind of item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KindFields {
    Scene {
        #[serde(skip_serializing_if = "Option::is_none")]
        director: Option<String>,
    },
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        photographer: Option<String>,
    },
}

impl KindFields {
    pub fn empty_for(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Scene => KindFields::Scene { director: None },
            ItemKind::Image => KindFields::Image { photographer: None },
        }
    }
}

/// Metadata produced by one strategy for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ScrapedEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performers: Vec<ScrapedEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio: Option<ScrapedEntity>,
    #[serde(flatten)]
    pub kind_fields: KindFields,
}

impl ScrapedData {
    pub fn empty(kind: ItemKind) -> Self {
        Self {
            title: None,
            code: None,
            details: None,
            date: None,
            urls: Vec::new(),
            tags: Vec::new(),
            performers: Vec::new(),
            studio: None,
            kind_fields: KindFields::empty_for(kind),
        }
    }

    /// True when at least one field the orchestrator would write is present.
    pub fn has_useful_data(&self) -> bool {
        fn present(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }

        !self.tags.is_empty()
            || !self.performers.is_empty()
            || self.studio.is_some()
            || present(&self.title)
            || present(&self.details)
            || present(&self.date)
            || !self.urls.is_empty()
    }
}

/// Field changes sent to the store for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performer_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    /// Names of the fields this update would write, in a stable order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.tag_ids.is_some() {
            names.push("tags");
        }
        if self.performer_ids.is_some() {
            names.push("performer_ids");
        }
        if self.studio_id.is_some() {
            names.push("studio_id");
        }
        let scalars = [
            ("title", &self.title),
            ("details", &self.details),
            ("date", &self.date),
            ("code", &self.code),
            ("director", &self.director),
            ("photographer", &self.photographer),
        ];
        for (name, value) in scalars {
            if value.as_deref().is_some_and(|s| !s.is_empty()) {
                names.push(name);
            }
        }
        if self.urls.as_ref().is_some_and(|v| !v.is_empty()) {
            names.push("urls");
        }
        names
    }
}

/// A tag entity in the store, as seen by the description sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTag {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl StoreTag {
    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}
