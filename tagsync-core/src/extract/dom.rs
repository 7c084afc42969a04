//! Text collection over a parsed page with site chrome masked out.

use scraper::{ElementRef, Node};

/// Element ids that mark navigation and page furniture.
const CHROME_IDS: &[&str] = &["header", "navbar", "subnavbar", "paginator"];
/// Class names that mark side panels and notices.
const CHROME_CLASSES: &[&str] = &["sidebar", "notice"];
/// Substrings of id/class that disqualify a generic block.
const CHROME_HINTS: &[&str] = &[
    "header",
    "navbar",
    "subnavbar",
    "sidebar",
    "paginator",
    "notice",
    "footer",
    "pagination",
];

/// Whether an element is removed from the page before extraction.
pub fn is_chrome(element: &ElementRef) -> bool {
    let value = element.value();
    if matches!(value.name(), "script" | "style") {
        return true;
    }
    if value.id().is_some_and(|id| CHROME_IDS.contains(&id)) {
        return true;
    }
    value.classes().any(|class| CHROME_CLASSES.contains(&class))
}

/// Whether the element or any of its ancestors is chrome.
pub fn within_chrome(element: &ElementRef) -> bool {
    is_chrome(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| is_chrome(&ancestor))
}

/// Looser test used for generic blocks: id or class merely mentions chrome.
pub fn looks_like_chrome(element: &ElementRef) -> bool {
    let value = element.value();
    let id = value.id().unwrap_or_default().to_lowercase();
    let class = value.classes().collect::<Vec<_>>().join(" ").to_lowercase();
    CHROME_HINTS
        .iter()
        .any(|hint| id.contains(hint) || class.contains(hint))
}

fn collect_text(element: ElementRef, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let s: &str = text;
                out.push(s.to_string());
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_chrome(&child) {
                        collect_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// All text under `element`, joined by `separator` and trimmed, skipping
/// chrome subtrees.
pub fn block_text(element: ElementRef, separator: &str) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    parts.join(separator).trim().to_string()
}
