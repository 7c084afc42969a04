//! Categorised tags read from a post's HTML page.

use std::sync::{Arc, LazyLock};

use scraper::{ElementRef, Html, Selector};

use crate::error::ScrapeError;
use crate::http::{FetchRequest, ResilientFetcher};

use super::mapping::{post_view_url, TagCategories, TagCategory};

/// Body text the site serves, with a 200, for posts that do not exist.
pub const NOT_FOUND_MARKERS: &[&str] = &["Nobody here but us chickens", "Post not found"];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li a").expect("Invalid selector"));

/// Category for a tag list item, by substring of its class attribute.
fn category_for_class(class: &str) -> Option<TagCategory> {
    let has = |needles: &[&str]| needles.iter().any(|n| class.contains(n));
    if has(&["tag-type-character", "character"]) {
        Some(TagCategory::Character)
    } else if has(&["tag-type-artist", "artist"]) {
        Some(TagCategory::Artist)
    } else if has(&["tag-type-copyright", "copyright", "series"]) {
        Some(TagCategory::Copyright)
    } else if has(&["tag-type-metadata", "meta"]) {
        Some(TagCategory::Meta)
    } else if has(&["tag-type-general", "tag"]) {
        Some(TagCategory::General)
    } else {
        None
    }
}

fn enclosing_list_item<'a>(link: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "li")
}

/// Collect tag names from the tag sidebar's `li` entries.
///
/// Link text has underscores replaced by spaces; `?` help links and
/// single-character names are dropped, and each category is de-duplicated.
pub fn parse_post_tags(document: &Html) -> TagCategories {
    let mut categories = TagCategories::default();

    for link in document.select(&LINK_SELECTOR) {
        let Some(item) = enclosing_list_item(&link) else {
            continue;
        };
        let Some(category) = category_for_class(item.value().attr("class").unwrap_or_default())
        else {
            continue;
        };

        let raw: String = link.text().map(str::trim).collect();
        let name = raw.replace('_', " ").trim().to_string();
        if name == "?" || name.chars().count() <= 1 {
            continue;
        }
        categories.push_unique(category, name);
    }

    categories
}

pub struct PostPage {
    fetcher: Arc<ResilientFetcher>,
    site_url: String,
}

impl PostPage {
    pub fn new(fetcher: Arc<ResilientFetcher>, site_url: &str) -> Self {
        Self {
            fetcher,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Fetch a post page and read its tags.
    ///
    /// A page with no recognisable tags is a `ParseFailure`.
    pub async fn fetch_tags(&self, post_id: &str) -> Result<TagCategories, ScrapeError> {
        let url = post_view_url(&self.site_url, post_id);
        tracing::debug!(%url, "fetching post page");

        let request = NOT_FOUND_MARKERS
            .iter()
            .fold(FetchRequest::get(url).header("Accept", "text/html"), |req, marker| {
                req.not_found_marker(marker)
            });
        let html = self.fetcher.fetch(&request).await.into_text()?;

        let tags = parse_post_tags(&Html::parse_document(&html));
        tracing::debug!(
            post_id,
            characters = tags.characters.len(),
            artists = tags.artists.len(),
            copyrights = tags.copyrights.len(),
            general = tags.general.len(),
            meta = tags.meta.len(),
            "extracted post tags"
        );

        if tags.is_empty() {
            return Err(ScrapeError::ParseFailure(format!(
                "no tags found on post {post_id}"
            )));
        }
        Ok(tags)
    }
}
