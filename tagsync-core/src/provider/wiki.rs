//! Tag descriptions from the provider's wiki.
//!
//! Two round trips per tag: the wiki search page, resolved to a page id, and
//! then the wiki page itself.

use std::sync::Arc;

use scraper::Html;

use crate::error::ScrapeError;
use crate::extract::{extract_best, Extraction, ExtractionMiss};
use crate::http::{FetchRequest, ResilientFetcher};
use crate::lookup::{normalize_key, resolve, wiki_candidates, Resolution};

pub struct WikiScraper {
    fetcher: Arc<ResilientFetcher>,
    site_url: String,
}

impl WikiScraper {
    pub fn new(fetcher: Arc<ResilientFetcher>, site_url: &str) -> Self {
        Self {
            fetcher,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Find the wiki page id for a tag.
    pub async fn find_page_id(&self, tag_name: &str) -> Result<Resolution, ScrapeError> {
        let key = normalize_key(tag_name);
        let request = FetchRequest::get(format!("{}/index.php", self.site_url))
            .query("page", "wiki")
            .query("s", "list")
            .query("search", key.as_str());

        tracing::debug!(tag = tag_name, "searching wiki");
        let html = self.fetcher.fetch(&request).await.into_text()?;
        let candidates = wiki_candidates(&Html::parse_document(&html));
        Ok(resolve(&key, &candidates))
    }

    /// Fetch a wiki page by id and extract its description.
    pub async fn fetch_page(&self, page_id: &str) -> Result<Extraction, ScrapeError> {
        let request = FetchRequest::get(format!("{}/index.php", self.site_url))
            .query("page", "wiki")
            .query("s", "view")
            .query("id", page_id);

        tracing::debug!(page_id, "fetching wiki page");
        let html = self.fetcher.fetch(&request).await.into_text()?;
        extract_best(&Html::parse_document(&html)).map_err(|miss| match miss {
            ExtractionMiss::Rejected => ScrapeError::ValidationFailure,
            ExtractionMiss::NoContent | ExtractionMiss::NoCandidate => {
                ScrapeError::ParseFailure("no description on wiki page".to_string())
            }
        })
    }

    /// Search, resolve and extract the description for one tag.
    ///
    /// No wiki page is `NotFound`. A page with no candidate text is
    /// `ParseFailure`, and one whose candidates all fail validation is
    /// `ValidationFailure`. Transient fetch failures surface as their own kinds.
    pub async fn scrape_tag(&self, tag_name: &str) -> Result<Extraction, ScrapeError> {
        let resolution = self.find_page_id(tag_name).await?;
        let Some(page_id) = resolution.provider_id() else {
            tracing::debug!(tag = tag_name, "no wiki page for tag");
            return Err(ScrapeError::NotFound);
        };

        let extraction = self.fetch_page(page_id).await?;
        tracing::debug!(
            tag = tag_name,
            description = %truncate(extraction.description.as_str(), 100),
            "found description"
        );
        Ok(extraction)
    }
}

/// At most `max` characters of `text`.
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{MockClient, RateLimiter, RetryPolicy};
    use std::time::Duration;

    const SEARCH: &str = r#"<html><body><div id="content"><table>
        <tr><td><a href="index.php?page=wiki&amp;s=view&amp;id=31">samus_aran</a></td></tr>
    </table></div></body></html>"#;

    const PAGE: &str = r#"<html><body><div id="content"><table><tr><td>
        Now Viewing: samus_aran
        Tag type: Character
        Samus Aran is a bounty hunter and the main character of the Metroid series.
        Other Wiki Information
        Last updated: 2024-01-01 by editor
    </td></tr></table></div></body></html>"#;

    fn scraper(client: MockClient) -> WikiScraper {
        let fetcher = ResilientFetcher::new(
            Arc::new(client),
            RateLimiter::disabled(),
            RetryPolicy::new(5, Duration::from_secs(2)),
        );
        WikiScraper::new(Arc::new(fetcher), "https://booru.example")
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_tag_end_to_end() {
        let client = MockClient::new()
            .with_html(
                "https://booru.example/index.php?page=wiki&s=list&search=samus_aran",
                SEARCH,
            )
            .with_html(
                "https://booru.example/index.php?page=wiki&s=view&id=31",
                PAGE,
            );
        let found = scraper(client).scrape_tag("Samus Aran").await.unwrap();
        assert_eq!(
            found.description.as_str(),
            "Samus Aran is a bounty hunter and the main character of the Metroid series."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_page_is_not_found() {
        let client = MockClient::new().with_html(
            "https://booru.example/index.php?page=wiki&s=list&search=nobody",
            "<html><body><div id=\"content\">No results</div></body></html>",
        );
        assert_eq!(
            scraper(client).scrape_tag("nobody").await.unwrap_err(),
            ScrapeError::NotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_error_kinds() {
        let client = MockClient::new()
            .with_html(
                "https://booru.example/index.php?page=wiki&s=view&id=7",
                r#"<html><body><div id="content">
                    <p>Reset cookie / GDPR consent | Reset cookie / GDPR consent | Reset cookie</p>
                </div></body></html>"#,
            )
            .with_html(
                "https://booru.example/index.php?page=wiki&s=view&id=8",
                r#"<html><body><div id="content"><p>Nothing.</p></div></body></html>"#,
            );
        let wiki = scraper(client);

        assert_eq!(
            wiki.fetch_page("7").await.unwrap_err(),
            ScrapeError::ValidationFailure
        );
        assert!(matches!(
            wiki.fetch_page("8").await.unwrap_err(),
            ScrapeError::ParseFailure(_)
        ));
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
