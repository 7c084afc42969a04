//! Truncation of related-tag dumps that trail a description.

use std::sync::LazyLock;

use regex::Regex;

/// Tags that almost never appear in prose but open most tag dumps.
const DUMP_MARKERS: &[&str] = &[
    r"\d+girls?",
    r"\d+boys?",
    "big_breasts",
    "large_breasts",
    "huge_breasts",
    "small_breasts",
    "medium_breasts",
    "blonde_hair",
    "black_hair",
    "brown_hair",
    "blue_eyes",
    "green_eyes",
    "brown_eyes",
    "female_only",
    "male_only",
    "solo_female",
    "solo_male",
    "nude_female",
    "nude_male",
    "completely_nude",
    "high_resolution",
    "highres",
    "hi_res",
    "digital_media",
    "digital_art",
    "original_character",
    "female_focus",
    "male_focus",
];

static DUMP_START: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = DUMP_MARKERS.iter().map(|m| format!(r"\b{m}\b")).collect();
    Regex::new(&format!("(?i){}", alternatives.join("|"))).expect("Invalid tag dump regex")
});

static UNDERSCORE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+_\w+\b").expect("Invalid underscore token regex"));

/// Characters after the first marker inspected for more tags.
const WINDOW_CHARS: usize = 200;
/// Underscore-joined tokens in the window that confirm a dump.
const MIN_DUMP_TOKENS: usize = 5;
/// Share of the pre-dump text a sentence-boundary trim must keep.
const MIN_KEEP_RATIO: f64 = 0.3;

fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cut the text at the first tag dump.
///
/// A dump starts at the first marker tag followed, within 200 characters, by
/// at least five underscore-joined tokens. The cut then moves back to the last
/// sentence end if that keeps at least 30% of the text before the dump.
pub fn remove_tag_dumps(text: &str) -> String {
    let Some(m) = DUMP_START.find(text) else {
        return text.to_string();
    };

    let before = &text[..m.start()];
    let after = &text[m.start()..];

    let tag_count = UNDERSCORE_TOKEN
        .find_iter(char_prefix(after, WINDOW_CHARS))
        .count();
    if tag_count < MIN_DUMP_TOKENS {
        return text.to_string();
    }

    let sentence_end = [". ", ".\n", ".)"]
        .iter()
        .filter_map(|boundary| before.rfind(boundary))
        .max();

    if let Some(end) = sentence_end {
        let kept_chars = before[..end].chars().count() as f64;
        let total_chars = before.chars().count() as f64;
        if kept_chars > total_chars * MIN_KEEP_RATIO {
            return before[..=end].trim().to_string();
        }
    }

    before.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "1girls big_breasts blue_eyes solo_female long_hair looking_at_viewer";

    #[test]
    fn test_no_marker_keeps_text() {
        let text = "A knight from the northern kingdoms.";
        assert_eq!(remove_tag_dumps(text), text);
    }

    #[test]
    fn test_marker_in_prose_is_not_a_dump() {
        let text = "She is usually drawn with blue_eyes and a sword.";
        assert_eq!(remove_tag_dumps(text), text);
    }

    #[test]
    fn test_trims_back_to_late_sentence_end() {
        let text = format!("First sentence here. Second sentence then trailing words {DUMP}");
        assert_eq!(remove_tag_dumps(&text), "First sentence here.");
    }

    #[test]
    fn test_keeps_full_prefix_when_sentence_end_is_early() {
        // The only boundary sits well under 30% of the pre-dump text.
        let text = format!("Hi. this part keeps going without any full stop at all {DUMP}");
        assert_eq!(
            remove_tag_dumps(&text),
            "Hi. this part keeps going without any full stop at all"
        );
    }

    #[test]
    fn test_retains_at_least_thirty_percent() {
        let prose = "An adventurer. She travels widely and fights monsters in far lands";
        let text = format!("{prose} {DUMP}");
        let out = remove_tag_dumps(&text);
        assert!(out.len() as f64 >= prose.len() as f64 * 0.3);
        assert!(!out.contains("big_breasts"));
    }
}
