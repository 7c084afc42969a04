//! Turning provider posts into scraped metadata.

use serde::Serialize;

use crate::types::{ItemKind, ScrapedData, ScrapedEntity};

/// A post's tags grouped by the provider's tag types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagCategories {
    pub characters: Vec<String>,
    pub artists: Vec<String>,
    pub copyrights: Vec<String>,
    pub general: Vec<String>,
    pub meta: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    Character,
    Artist,
    Copyright,
    General,
    Meta,
}

impl TagCategories {
    pub fn list_mut(&mut self, category: TagCategory) -> &mut Vec<String> {
        match category {
            TagCategory::Character => &mut self.characters,
            TagCategory::Artist => &mut self.artists,
            TagCategory::Copyright => &mut self.copyrights,
            TagCategory::General => &mut self.general,
            TagCategory::Meta => &mut self.meta,
        }
    }

    /// Add a name unless the category already holds it.
    pub fn push_unique(&mut self, category: TagCategory, name: String) {
        let list = self.list_mut(category);
        if !list.contains(&name) {
            list.push(name);
        }
    }

    pub fn total(&self) -> usize {
        self.characters.len()
            + self.artists.len()
            + self.copyrights.len()
            + self.general.len()
            + self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Split the API's space-separated tag string into categories.
///
/// `character:`, `artist:`, `copyright:` and `meta:` prefixes pick the
/// category; anything else, including unknown prefixes, is general.
/// Underscores become spaces.
pub fn parse_tag_string(tags: &str) -> TagCategories {
    let mut categories = TagCategories::default();

    for token in tags.split_whitespace() {
        let (category, name) = match token.split_once(':') {
            Some(("character", name)) => (TagCategory::Character, name),
            Some(("artist", name)) => (TagCategory::Artist, name),
            Some(("copyright", name)) => (TagCategory::Copyright, name),
            Some(("meta", name)) => (TagCategory::Meta, name),
            _ => (TagCategory::General, token),
        };
        categories
            .list_mut(category)
            .push(name.replace('_', " "));
    }

    categories
}

/// Post fields other than tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostMeta {
    pub id: String,
    pub score: Option<String>,
    pub rating: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub title: Option<String>,
}

impl PostMeta {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// "Score: N | Dimensions: WxH", whichever parts are known.
    pub fn details(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(score) = non_empty(&self.score) {
            parts.push(format!("Score: {score}"));
        }
        if let (Some(w), Some(h)) = (non_empty(&self.width), non_empty(&self.height)) {
            parts.push(format!("Dimensions: {w}x{h}"));
        }
        (!parts.is_empty()).then(|| parts.join(" | "))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Full label for a rating code; unknown codes pass through unchanged.
pub fn rating_label(code: &str) -> &str {
    match code {
        "s" => "safe",
        "q" => "questionable",
        "e" => "explicit",
        other => other,
    }
}

/// How provider tags are named when written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStyle {
    /// Bare names for general, copyright and meta tags plus the rating label.
    /// Artists only become the studio.
    Plain,
    /// Every tag under `{prefix}:`, with `artist:`, `series:`, `meta:` and
    /// `rating:` sub-namespaces.
    Namespaced { prefix: String },
}

impl TagStyle {
    fn tag_names(&self, categories: &TagCategories, rating: Option<&str>) -> Vec<String> {
        let rating = rating.filter(|r| !r.is_empty()).map(rating_label);
        match self {
            TagStyle::Plain => categories
                .general
                .iter()
                .chain(&categories.copyrights)
                .chain(&categories.meta)
                .cloned()
                .chain(rating.map(str::to_string))
                .collect(),
            TagStyle::Namespaced { prefix } => {
                let general = categories.general.iter().map(|t| format!("{prefix}:{t}"));
                let artists = categories
                    .artists
                    .iter()
                    .map(|t| format!("{prefix}:artist:{t}"));
                let series = categories
                    .copyrights
                    .iter()
                    .map(|t| format!("{prefix}:series:{t}"));
                let meta = categories
                    .meta
                    .iter()
                    .map(|t| format!("{prefix}:meta:{t}"));
                let rating = rating.map(|r| format!("{prefix}:rating:{r}"));
                general
                    .chain(artists)
                    .chain(series)
                    .chain(meta)
                    .chain(rating)
                    .collect()
            }
        }
    }
}

/// Public URL of a post page.
pub fn post_view_url(site_url: &str, post_id: &str) -> String {
    format!(
        "{}/index.php?page=post&s=view&id={}",
        site_url.trim_end_matches('/'),
        post_id
    )
}

/// Map a post to the metadata shape the orchestrator consumes.
///
/// Characters become performers and the first artist becomes the studio.
pub fn to_scraped_data(
    kind: ItemKind,
    site_url: &str,
    post: &PostMeta,
    categories: &TagCategories,
    style: &TagStyle,
) -> ScrapedData {
    let mut data = ScrapedData::empty(kind);

    data.title = non_empty(&post.title).map(str::to_string);
    if !post.id.is_empty() {
        data.urls.push(post_view_url(site_url, &post.id));
    }
    data.performers = categories
        .characters
        .iter()
        .map(ScrapedEntity::named)
        .collect();
    data.studio = categories.artists.first().map(ScrapedEntity::named);
    data.tags = style
        .tag_names(categories, post.rating.as_deref())
        .into_iter()
        .map(ScrapedEntity::named)
        .collect();
    data.details = post.details();

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_string_routes_prefixes() {
        let cats = parse_tag_string(
            "1girls character:samus_aran artist:some_artist copyright:metroid meta:tagme weird:thing solo",
        );
        assert_eq!(cats.characters, vec!["samus aran"]);
        assert_eq!(cats.artists, vec!["some artist"]);
        assert_eq!(cats.copyrights, vec!["metroid"]);
        assert_eq!(cats.meta, vec!["tagme"]);
        assert_eq!(cats.general, vec!["1girls", "weird:thing", "solo"]);
        assert_eq!(cats.total(), 7);
    }

    #[test]
    fn test_parse_empty_tag_string() {
        assert!(parse_tag_string("   ").is_empty());
    }

    #[test]
    fn test_details_formatting() {
        let post = PostMeta {
            score: Some("42".into()),
            width: Some("1920".into()),
            height: Some("1080".into()),
            ..PostMeta::with_id("1")
        };
        assert_eq!(
            post.details().as_deref(),
            Some("Score: 42 | Dimensions: 1920x1080")
        );
        assert_eq!(PostMeta::with_id("1").details(), None);
    }

    #[test]
    fn test_plain_mapping() {
        let cats = parse_tag_string("solo character:zelda artist:painter artist:other copyright:hyrule");
        let post = PostMeta {
            rating: Some("q".into()),
            ..PostMeta::with_id("99")
        };
        let data = to_scraped_data(
            ItemKind::Image,
            "https://booru.example/",
            &post,
            &cats,
            &TagStyle::Plain,
        );

        assert_eq!(data.urls, vec!["https://booru.example/index.php?page=post&s=view&id=99"]);
        assert_eq!(data.performers, vec![ScrapedEntity::named("zelda")]);
        assert_eq!(data.studio, Some(ScrapedEntity::named("painter")));
        let tags: Vec<_> = data.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["solo", "hyrule", "questionable"]);
    }

    #[test]
    fn test_namespaced_mapping() {
        let cats = parse_tag_string("solo artist:painter copyright:hyrule meta:highres");
        let post = PostMeta {
            rating: Some("x".into()),
            ..PostMeta::with_id("5")
        };
        let style = TagStyle::Namespaced {
            prefix: "r34".into(),
        };
        let data = to_scraped_data(ItemKind::Scene, "https://booru.example", &post, &cats, &style);
        let tags: Vec<_> = data.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "r34:solo",
                "r34:artist:painter",
                "r34:series:hyrule",
                "r34:meta:highres",
                "r34:rating:x",
            ]
        );
    }
}
