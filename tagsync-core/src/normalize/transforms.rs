//! The individual cleaning steps, in pipeline order.
//!
//! Each step is a pure `&str -> String` function and can be tested alone.

use std::sync::LazyLock;

use regex::Regex;

pub use super::tag_dump::remove_tag_dumps;

pub type Transform = fn(&str) -> String;

/// Cleaning steps applied in order by [`super::clean`].
pub const PIPELINE: &[(&str, Transform)] = &[
    ("whitespace", collapse_whitespace),
    ("edit_markers", strip_edit_markers),
    ("page_header", strip_page_header),
    ("footer", strip_footer),
    ("boilerplate", strip_boilerplate),
    ("site_chrome", strip_site_chrome),
    ("sections", rewrite_sections),
    ("links", strip_links),
    ("tag_dumps", remove_tag_dumps),
    ("punctuation", tidy_punctuation),
];

type Rules = LazyLock<Vec<(Regex, &'static str)>>;

fn compile(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("Invalid cleanup regex"),
                *replacement,
            )
        })
        .collect()
}

fn apply(rules: &[(Regex, &'static str)], text: &str) -> String {
    rules.iter().fold(text.to_string(), |acc, (re, replacement)| {
        re.replace_all(&acc, *replacement).into_owned()
    })
}

static WHITESPACE: Rules =
    LazyLock::new(|| compile(&[(r"[ \t]+", " "), (r"\n\s*\n", "\n")]));

/// Collapse horizontal whitespace and blank lines.
pub fn collapse_whitespace(text: &str) -> String {
    apply(&WHITESPACE, text).trim().to_string()
}

static EDIT_MARKERS: Rules = LazyLock::new(|| compile(&[(r"(?i)\[edit\]", "")]));

pub fn strip_edit_markers(text: &str) -> String {
    apply(&EDIT_MARKERS, text)
}

const TAG_TYPES: &str = "General|Character|Copyright|Artist|Meta|Ambiguous|Lore";

static HEADER_COMBINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^Now Viewing:\s*\S+\s*Tag type:\s*(?:{TAG_TYPES})\s*"
    ))
    .expect("Invalid header regex")
});

static HEADER_LOOSE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    let known_type = format!(r"(?i)^Tag type:\s*(?:{TAG_TYPES})\s+");
    vec![
        (
            Regex::new(r"(?i)^Now Viewing:\s*\S+\s*").expect("Invalid header regex"),
            "",
        ),
        (Regex::new(&known_type).expect("Invalid header regex"), ""),
        (
            Regex::new(r"(?i)^Tag type:\s*\w+\s+").expect("Invalid header regex"),
            "",
        ),
    ]
});

/// Strip the "Now Viewing: X Tag type: Y" page header.
///
/// The combined pattern only accepts known tag types so the first word of the
/// description is never taken for the type. The looser patterns run only when
/// the combined one does not match.
pub fn strip_page_header(text: &str) -> String {
    match HEADER_COMBINED.find(text) {
        Some(m) => text[m.end()..].to_string(),
        None => apply(&HEADER_LOOSE, text),
    }
}

static FOOTER: Rules = LazyLock::new(|| {
    compile(&[
        (r"(?is)\s*Other Wiki Information\s*Last updated:.*$", ""),
        (r"(?is)\s*Last updated:\s*[^.]+\.\s*by\s+\w+.*$", ""),
    ])
});

/// Drop the wiki footer and everything after it.
pub fn strip_footer(text: &str) -> String {
    apply(&FOOTER, text)
}

static BOILERPLATE: Rules = LazyLock::new(|| {
    compile(&[
        (
            r"(?i)\s*This entry is not locked and you can edit it as you see fit\.?\s*",
            "",
        ),
        (r"(?i)\s*This entry is locked[^.]*\.?\s*", ""),
        (r"(?i)\s*View more\s*[»>]?\s*$", ""),
        (r"(?i)\s*View more\s*[»>]?\s*", " "),
        (
            r"(?i)\s*There are no images associated with this wiki entry\.?\s*",
            "",
        ),
    ])
});

pub fn strip_boilerplate(text: &str) -> String {
    apply(&BOILERPLATE, text)
}

static SITE_CHROME: Rules = LazyLock::new(|| {
    compile(&[
        (r"(?i)\s*Reset cookie\s*/?\s*GDPR consent\s*", ""),
        (r"(?i)\s*GDPR consent\s*", ""),
        (r"(?i)\s*Reset cookie\s*", ""),
    ])
});

/// Cookie and consent notices.
pub fn strip_site_chrome(text: &str) -> String {
    apply(&SITE_CHROME, text)
}

static DROPPED_SECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"h4\.\s*See also",
        r"h4\.\s*External links?",
        r"h4\.\s*Links?",
        r"h4\.\s*References?",
        r"h4\.\s*Typical Tags?",
        r"h4\.\s*Related Tags?",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("Invalid section regex"))
    .collect()
});

static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)h4\.").expect("Invalid section regex"));

static SECTION_LABELS: Rules = LazyLock::new(|| {
    compile(&[
        (
            r"(?i)\bh4\.\s*(Original characters?)\s*:?\s*",
            "Original characters: ",
        ),
        (r"(?i)\bh4\.\s*(Types?)\s*:?\s*", "Types: "),
        (r"\bh4\.\s*(\w+)\s*:?\s*", "${1}: "),
    ])
});

/// Remove every section headed by `header`, up to the next section marker or
/// the end of the text.
fn drop_section(text: &str, header: &Regex) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(m) = header.find(rest) {
        out.push_str(&rest[..m.start()]);
        let after = &rest[m.end()..];
        match SECTION_MARKER.find(after) {
            Some(next) => rest = &after[next.start()..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

/// Drop navigational `h4.` sections and turn the remaining ones into
/// "Label: " prefixes.
pub fn rewrite_sections(text: &str) -> String {
    let text = DROPPED_SECTIONS
        .iter()
        .fold(text.to_string(), |acc, header| drop_section(&acc, header));
    apply(&SECTION_LABELS, &text)
}

static LINKS: Rules = LazyLock::new(|| {
    compile(&[
        // "label":url, "label":[url]
        (r#""([^"]+)":\[?(?:https?://)?[^\s\[\]"]+\]?"#, "${1}"),
        (r#""([^"]+)":/[^\s"]+"#, "${1}"),
        // [[target|label]], [[target]]
        (r"\[\[([^\]|]+)\|([^\]]+)\]\]", "${2}"),
        (r"\[\[([^\]]+)\]\]", "${1}"),
        (r#"https?://[^\s<>"]+"#, ""),
        (r"\b\w+\.(?:com|org|net|info|jp|co\.uk)[^\s]*", ""),
        (r"\[[^\]]*\]", ""),
        (r"=[^\s&]*", ""),
        (r"&\w+", ""),
        (r"\?utf8", ""),
    ])
});

/// Reduce markup links to their labels and strip URL debris.
pub fn strip_links(text: &str) -> String {
    apply(&LINKS, text)
}

static BULLETS: Rules = LazyLock::new(|| {
    compile(&[
        (r"\*\s+", "• "),
        (r"(?m)^\s*\*\s*", "• "),
        (r"\|\s*\*\s*", " • "),
        (r"\s*\|\s*", " "),
        (r"\*\s*", ", "),
        (r",\s*,", ","),
        (r":\s*,\s*", ": "),
        (r"\b\w+_,\s*", ""),
        (r",\s*_\w+\b", ""),
        (r"\.([A-Z])", ". ${1}"),
        (r"•\s*(\w)", "• ${1}"),
        (r"(\w)•", "${1} •"),
    ])
});

static FINAL_TIDY: Rules = LazyLock::new(|| {
    compile(&[
        (r"\(\s*\)", ""),
        (r"\[\s*\]", ""),
        (r"\]", ""),
        (r"\s+", " "),
        (r"\.{2,}", "."),
        (r"\s+([.,;:!?])", "${1}"),
        (r"^[,;:\s•*]+", ""),
        (r"[,;:\s•*]+$", ""),
        (r"•(\s*•)+", "•"),
        (r":\s*•\s*$", ""),
    ])
});

/// Bullets, separators and stray punctuation.
pub fn tidy_punctuation(text: &str) -> String {
    let text = apply(&BULLETS, text);
    apply(&FINAL_TIDY, &text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b\n\n\n c  "), "a b\n c");
    }

    #[test]
    fn test_page_header_known_type() {
        assert_eq!(
            strip_page_header("Now Viewing: samus_aran Tag type: Character A bounty hunter."),
            "A bounty hunter."
        );
    }

    #[test]
    fn test_page_header_does_not_eat_description() {
        // Unknown type: only the "Now Viewing" part and the "Tag type" word go.
        assert_eq!(
            strip_page_header("Now Viewing: foo Tag type: Weird The real text."),
            "The real text."
        );
        assert_eq!(strip_page_header("Plain text."), "Plain text.");
    }

    #[test]
    fn test_footer_removed() {
        assert_eq!(
            strip_footer("Prose here. Other Wiki Information Last updated: 2020-01-01 by bob"),
            "Prose here."
        );
        assert_eq!(
            strip_footer("Prose here. Last updated: 2021-02-03 12:00. by alice trailing"),
            "Prose here."
        );
    }

    #[test]
    fn test_boilerplate_and_chrome() {
        assert_eq!(
            strip_boilerplate("Text. This entry is not locked and you can edit it as you see fit."),
            "Text."
        );
        assert_eq!(strip_boilerplate("Text. View more »"), "Text.");
        assert_eq!(strip_site_chrome("Reset cookie / GDPR consent Text"), "Text");
    }

    #[test]
    fn test_drop_named_sections_until_next_marker() {
        let text = "Intro. h4. See also foo bar h4. History Was made in 1990. h4. External links baz";
        assert_eq!(rewrite_sections(text), "Intro. History: Was made in 1990. ");
    }

    #[test]
    fn test_section_label_special_cases() {
        assert_eq!(
            rewrite_sections("h4. Original character: Jane"),
            "Original characters: Jane"
        );
        assert_eq!(rewrite_sections("h4. Type: A, B"), "Types: A, B");
    }

    #[test]
    fn test_links_reduced_to_labels() {
        assert_eq!(
            strip_links(r#"See "the page":https://example.com/wiki for more"#),
            "See the page for more"
        );
        assert_eq!(strip_links("A [[samus aran|Samus]] story"), "A Samus story");
        assert_eq!(strip_links("A [[metroid]] game"), "A metroid game");
        assert_eq!(strip_links("Visit site.com/path now"), "Visit  now");
    }

    #[test]
    fn test_tidy_bullets_and_punctuation() {
        assert_eq!(
            tidy_punctuation("Types: * one * two"),
            "Types: • one • two"
        );
        assert_eq!(tidy_punctuation("end.Start again .."), "end. Start again.");
        assert_eq!(tidy_punctuation(", • leading and trailing ;"), "leading and trailing");
        assert_eq!(tidy_punctuation("empty () parens"), "empty parens");
    }
}
