//! Cleaning and validation of extracted description text.

mod tag_dump;
pub mod transforms;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use transforms::PIPELINE;

/// Extra passes allowed for the pipeline to settle on a fixed point.
const MAX_SETTLE_PASSES: usize = 8;

static GARBAGE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^This entry is (not )?locked",
        r"^Reset cookie",
        r"^GDPR consent",
        r"^Recent Changes",
        r"^Version \d+",
        r"^Last updated",
        r"^There are no images",
        r"^View more",
        // nothing but underscore-joined tags
        r"^(\w+_)+\w+(\s+(\w+_)+\w+){5,}$",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("Invalid garbage regex"))
    .collect()
});

fn run_pipeline(text: &str) -> String {
    PIPELINE
        .iter()
        .fold(text.to_string(), |acc, (_, transform)| transform(&acc))
}

/// Run the cleaning pipeline until the text stops changing.
///
/// Cleaning an already-clean description returns it unchanged.
pub fn clean(raw: &str) -> String {
    let mut text = run_pipeline(raw);
    for _ in 0..MAX_SETTLE_PASSES {
        let next = run_pipeline(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// Whether cleaned text is worth saving as a description.
pub fn is_valid(cleaned: &str) -> bool {
    if cleaned.is_empty() {
        return false;
    }

    let char_count = cleaned.chars().count();
    if char_count < 20 {
        return false;
    }
    if cleaned.split_whitespace().count() < 5 {
        return false;
    }

    let alpha = cleaned.chars().filter(|c| c.is_alphabetic()).count();
    if (alpha as f64) < char_count as f64 * 0.5 {
        return false;
    }

    !GARBAGE.iter().any(|re| re.is_match(cleaned))
}

/// Description text that has been cleaned and passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CleanedDescription(String);

impl CleanedDescription {
    /// Clean `raw` and keep it only if the result is valid.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let cleaned = clean(raw);
        is_valid(&cleaned).then_some(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CleanedDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
