//! Locating the description block on a wiki page.
//!
//! Three passes run in order over the page's `#content` region, and the
//! first that yields a valid cleaned description wins:
//!
//! 1. table cells, scored with [`score_candidate`], best one if it scores ≥ 10
//! 2. the first paragraph longer than 50 characters
//! 3. any other div of 50 to 5000 characters that is not page furniture

mod dom;
mod score;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::normalize::CleanedDescription;

pub use dom::{block_text, is_chrome, looks_like_chrome, within_chrome};
pub use score::score_candidate;

static CONTENT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#content").expect("Invalid selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("Invalid selector"));
static PARAGRAPH_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("Invalid selector"));
static DIV_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("Invalid selector"));

/// Minimum score for a table cell to be considered.
pub const MIN_SCORE: i32 = 10;

const MIN_CELL_CHARS: usize = 30;
const MIN_PARAGRAPH_CHARS: usize = 50;
const MIN_BLOCK_CHARS: usize = 50;
const MAX_BLOCK_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPass {
    TableCell,
    Paragraph,
    GenericBlock,
}

/// A raw block of text considered as the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub text: String,
    pub score: i32,
}

/// The winning candidate and its cleaned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub candidate: ExtractionCandidate,
    pub pass: ExtractionPass,
    pub description: CleanedDescription,
}

/// Why a page produced no description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMiss {
    /// The page has no `#content` region.
    NoContent,
    /// No block qualified as a candidate.
    NoCandidate,
    /// Candidates were found but none survived cleaning and validation.
    Rejected,
}

/// Find the best description on a parsed wiki page.
pub fn extract_best(document: &Html) -> Result<Extraction, ExtractionMiss> {
    let content = document
        .select(&CONTENT_SELECTOR)
        .next()
        .ok_or(ExtractionMiss::NoContent)?;

    let mut attempts = Attempts::default();
    let found = match table_cell_pass(content, &mut attempts) {
        Some(found) => Some(found),
        None => match paragraph_pass(content, &mut attempts) {
            Some(found) => Some(found),
            None => generic_block_pass(content, &mut attempts),
        },
    };

    found.ok_or(if attempts.rejected > 0 {
        ExtractionMiss::Rejected
    } else {
        ExtractionMiss::NoCandidate
    })
}

/// Candidates handed to validation during one extraction.
#[derive(Default)]
struct Attempts {
    rejected: usize,
}

impl Attempts {
    fn finish(&mut self, text: String, score: i32, pass: ExtractionPass) -> Option<Extraction> {
        let Some(description) = CleanedDescription::from_raw(&text) else {
            self.rejected += 1;
            tracing::debug!(?pass, score, "candidate failed validation");
            return None;
        };
        tracing::debug!(?pass, score, chars = description.as_str().len(), "description extracted");
        Some(Extraction {
            candidate: ExtractionCandidate { text, score },
            pass,
            description,
        })
    }
}

fn candidates<'a>(
    content: ElementRef<'a>,
    selector: &'a Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    content
        .select(selector)
        .filter(move |el| el.id() != content.id() && !within_chrome(el))
}

/// Cells that are only version or changelog metadata.
fn is_metadata_cell(text: &str) -> bool {
    text.starts_with("Version")
        || (text.contains("Recent Changes") && text.split('\n').count() < 5)
}

fn table_cell_pass(content: ElementRef, attempts: &mut Attempts) -> Option<Extraction> {
    let mut best: Option<ExtractionCandidate> = None;

    for cell in candidates(content, &CELL_SELECTOR) {
        let text = block_text(cell, "\n");
        if text.chars().count() < MIN_CELL_CHARS || is_metadata_cell(&text) {
            continue;
        }

        let score = score_candidate(&text);
        let best_score = best.as_ref().map_or(0, |b| b.score);
        if score > best_score {
            best = Some(ExtractionCandidate { text, score });
        }
    }

    let best = best.filter(|b| b.score >= MIN_SCORE)?;
    attempts.finish(best.text, best.score, ExtractionPass::TableCell)
}

fn paragraph_pass(content: ElementRef, attempts: &mut Attempts) -> Option<Extraction> {
    candidates(content, &PARAGRAPH_SELECTOR).find_map(|p| {
        let text = block_text(p, "");
        if text.chars().count() <= MIN_PARAGRAPH_CHARS {
            return None;
        }
        let score = score_candidate(&text);
        attempts.finish(text, score, ExtractionPass::Paragraph)
    })
}

fn generic_block_pass(content: ElementRef, attempts: &mut Attempts) -> Option<Extraction> {
    candidates(content, &DIV_SELECTOR).find_map(|div| {
        if looks_like_chrome(&div) {
            return None;
        }
        let text = block_text(div, "\n");
        let len = text.chars().count();
        if len <= MIN_BLOCK_CHARS || len >= MAX_BLOCK_CHARS {
            return None;
        }
        let score = score_candidate(&text);
        attempts.finish(text, score, ExtractionPass::GenericBlock)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(content: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div id="header">Now Viewing: nothing here at all in the header area</div>
               <div id="content">{content}</div></body></html>"#
        ))
    }

    #[test]
    fn test_table_cell_pass_picks_best_cell() {
        let doc = page(
            r#"<table><tr>
                <td>Version 3 (2021-01-01) by someone who edited this page</td>
                <td>Now Viewing: link
                    Tag type: Character
                    Link is the protagonist of the Legend of Zelda series. He is usually a young Hylian.
                    Other Wiki Information
                    Last updated: 2022-03-04 by editor</td>
                <td>Short cell with a few words only here.</td>
            </tr></table>"#,
        );

        let found = extract_best(&doc).unwrap();
        assert_eq!(found.pass, ExtractionPass::TableCell);
        assert!(found.candidate.score >= MIN_SCORE);
        assert_eq!(
            found.description.as_str(),
            "Link is the protagonist of the Legend of Zelda series. He is usually a young Hylian."
        );
    }

    #[test]
    fn test_paragraph_pass_when_no_cells() {
        let doc = page(
            r#"<p>tiny</p>
               <p>Zelda is the princess of Hyrule and appears throughout the series.</p>"#,
        );
        let found = extract_best(&doc).unwrap();
        assert_eq!(found.pass, ExtractionPass::Paragraph);
        assert_eq!(
            found.description.as_str(),
            "Zelda is the princess of Hyrule and appears throughout the series."
        );
    }

    #[test]
    fn test_generic_block_pass_skips_footer_divs() {
        let doc = page(
            r#"<div class="footer">Copyright notices and other legal text that nobody reads at all.</div>
               <div class="body">Ganondorf is the main antagonist in many games of the franchise.</div>"#,
        );
        let found = extract_best(&doc).unwrap();
        assert_eq!(found.pass, ExtractionPass::GenericBlock);
        assert!(found.description.as_str().starts_with("Ganondorf"));
    }

    #[test]
    fn test_cookie_block_and_short_paragraph_yield_nothing() {
        let doc = page(
            r#"<div class="consent">This site uses cookies. Reset cookie / GDPR consent</div>
               <p>See you later.</p>"#,
        );
        assert_eq!(extract_best(&doc), Err(ExtractionMiss::Rejected));
    }

    #[test]
    fn test_chrome_inside_content_is_ignored() {
        let doc = page(
            r#"<div class="sidebar"><p>Popular tags: this sidebar paragraph is long enough to qualify.</p></div>
               <div id="paginator"><p>Page one of many pages of results shown in the paginator.</p></div>"#,
        );
        assert_eq!(extract_best(&doc), Err(ExtractionMiss::NoCandidate));
    }

    #[test]
    fn test_no_content_region() {
        let doc = Html::parse_document("<p>Nothing in a content div here, just a stray paragraph.</p>");
        assert_eq!(extract_best(&doc), Err(ExtractionMiss::NoContent));
    }
}
