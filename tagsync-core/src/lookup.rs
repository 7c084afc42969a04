//! Resolving a tag name to the provider's wiki page id.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

static WIKI_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=(\d+)").expect("Invalid wiki id regex"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid selector"));

/// A search-result link: its text and the provider id it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupCandidate {
    pub link_text: String,
    pub provider_id: String,
}

impl LookupCandidate {
    pub fn new(link_text: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            link_text: link_text.into(),
            provider_id: provider_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact(String),
    /// Substring match in either direction; lower confidence.
    Partial(String),
    NotFound,
}

impl Resolution {
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Resolution::Exact(id) | Resolution::Partial(id) => Some(id),
            Resolution::NotFound => None,
        }
    }
}

/// Lookup key used on both sides of a comparison: trimmed, lowercased,
/// spaces replaced by underscores.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Match `query` against candidates: an exact normalized match first, then
/// the first candidate where either key contains the other.
pub fn resolve(query: &str, candidates: &[LookupCandidate]) -> Resolution {
    let key = normalize_key(query);
    if key.is_empty() {
        return Resolution::NotFound;
    }

    let normalized: Vec<(String, &LookupCandidate)> = candidates
        .iter()
        .map(|c| (normalize_key(&c.link_text), c))
        .collect();

    if let Some((_, c)) = normalized.iter().find(|(text, _)| *text == key) {
        return Resolution::Exact(c.provider_id.clone());
    }

    let partial = normalized
        .iter()
        .find(|(text, _)| !text.is_empty() && (key.contains(text.as_str()) || text.contains(&key)));

    match partial {
        Some((text, c)) => {
            tracing::debug!(query = %key, matched = %text, "using partial wiki match");
            Resolution::Partial(c.provider_id.clone())
        }
        None => Resolution::NotFound,
    }
}

/// Pull `(link text, id)` pairs out of a wiki search results page.
///
/// Only links to wiki view pages (`page=wiki`, `s=view`, `id=`) count.
pub fn wiki_candidates(document: &Html) -> Vec<LookupCandidate> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            if !(href.contains("page=wiki") && href.contains("s=view") && href.contains("id=")) {
                return None;
            }
            let id = WIKI_ID_REGEX.captures(href)?.get(1)?.as_str();
            let text: String = link.text().collect();
            Some(LookupCandidate::new(text.trim(), id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(pairs: &[(&str, &str)]) -> Vec<LookupCandidate> {
        pairs
            .iter()
            .map(|(text, id)| LookupCandidate::new(*text, *id))
            .collect()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Blue Eyes "), "blue_eyes");
        assert_eq!(normalize_key("Samus_Aran"), "samus_aran");
    }

    #[test]
    fn test_exact_match_beats_earlier_partial() {
        let list = candidates(&[("samus aran (zero suit)", "1"), ("Samus Aran", "2")]);
        assert_eq!(resolve("samus aran", &list), Resolution::Exact("2".into()));
    }

    #[test]
    fn test_partial_match_either_direction() {
        let list = candidates(&[("unrelated", "1"), ("link", "7")]);
        assert_eq!(resolve("link_(zelda)", &list), Resolution::Partial("7".into()));

        let list = candidates(&[("blue_eyes_white", "9")]);
        assert_eq!(resolve("blue eyes", &list), Resolution::Partial("9".into()));
    }

    #[test]
    fn test_first_partial_match_wins() {
        let list = candidates(&[("zelda", "3"), ("link", "4")]);
        assert_eq!(
            resolve("link_and_zelda", &list),
            Resolution::Partial("3".into())
        );
    }

    #[test]
    fn test_not_found() {
        let list = candidates(&[("mario", "1")]);
        assert_eq!(resolve("luigi", &list), Resolution::NotFound);
        assert_eq!(resolve("luigi", &[]), Resolution::NotFound);
        assert_eq!(resolve("   ", &list), Resolution::NotFound);
    }

    #[test]
    fn test_wiki_candidates_only_view_links() {
        let html = Html::parse_document(
            r#"<div id="content">
                <a href="index.php?page=wiki&amp;s=view&amp;id=123"> Blue eyes </a>
                <a href="index.php?page=wiki&amp;s=list&amp;search=blue">Search</a>
                <a href="index.php?page=post&amp;s=view&amp;id=5">Post</a>
                <a href="index.php?page=wiki&amp;s=view&amp;id=456">blue_eyes_white</a>
            </div>"#,
        );
        let found = wiki_candidates(&html);
        assert_eq!(
            found,
            vec![
                LookupCandidate::new("Blue eyes", "123"),
                LookupCandidate::new("blue_eyes_white", "456"),
            ]
        );
        assert_eq!(resolve("blue eyes", &found).provider_id(), Some("123"));
    }
}
