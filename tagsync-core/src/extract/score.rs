//! Heuristic scoring of table-cell candidates.

use std::sync::LazyLock;

use regex::Regex;

static SECONDARY_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bh4\.\s*(See also|External links)").expect("Invalid section regex")
});

static THREE_PART_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+_\w+_\w+\b").expect("Invalid token regex"));

const DESCRIPTIVE_PHRASES: &[&str] = &[
    "is a ",
    "are ",
    "refers to",
    "describes",
    "character",
    "series",
];

/// Blocks with more three-part underscore tokens than this are tag dumps.
const TAG_DUMP_TOKENS: usize = 20;

/// How likely a block of text is to be the page's description.
pub fn score_candidate(text: &str) -> i32 {
    let mut score = 0;

    // The page header only survives in the primary content block.
    if text.contains("Tag type:") {
        score += 20;
    }
    if DESCRIPTIVE_PHRASES.iter().any(|p| text.contains(p)) {
        score += 15;
    }
    if text.split('.').count() >= 2 {
        score += 10;
    }
    if SECONDARY_SECTION.is_match(text) {
        score += 5;
    }

    let len = text.chars().count();
    if 100 < len && len < 500 {
        score += 15;
    } else if 500 < len && len < 2000 {
        score += 10;
    } else if len > 2000 {
        score += 5;
    }

    if text.contains("Reset cookie") {
        score -= 30;
    }
    if text.contains("GDPR consent") {
        score -= 30;
    }
    if text.contains("Recent Changes") {
        score -= 20;
    }

    if THREE_PART_TOKEN.find_iter(text).count() > TAG_DUMP_TOKENS {
        score -= 30;
    }

    score
}
