//! The provider-backed scraping strategies shipped with the tool.

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::orchestrator::ScrapeStrategy;
use crate::types::{ScrapeItem, ScrapeMode, ScrapedData, Strategy};

use super::identity::{identify, md5_from_path, PostIdentifier};
use super::mapping::{to_scraped_data, PostMeta, TagStyle};
use super::post_api::PostApi;
use super::post_page::PostPage;

pub const POST_API_STRATEGY: &str = "post-api";
pub const POST_PAGE_STRATEGY: &str = "post-page";

/// Transient failures become "no data" so nothing negative is written.
fn quiet_transient<T>(result: Result<Option<T>, ScrapeError>, item: &ScrapeItem) -> Result<Option<T>, ScrapeError> {
    match result {
        Err(e) if e.is_transient() => {
            tracing::warn!(item = %item.id, error = %e, "temporary provider failure, returning no data");
            Ok(None)
        }
        other => other,
    }
}

/// Tags straight from the post API, looked up by md5.
pub struct PostApiStrategy {
    info: Strategy,
    api: Option<PostApi>,
    site_url: String,
}

impl PostApiStrategy {
    /// `api` is `None` when no credentials are configured.
    pub fn new(api: Option<PostApi>, site_url: &str) -> Self {
        Self {
            info: Strategy::new(POST_API_STRATEGY, POST_API_STRATEGY, &[ScrapeMode::Fragment]),
            api,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    async fn scrape_inner(&self, item: &ScrapeItem) -> Result<Option<ScrapedData>, ScrapeError> {
        let api = self.api.as_ref().ok_or(ScrapeError::MissingCredentials)?;

        let md5 = item
            .checksum
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| item.path.as_deref().and_then(md5_from_path));
        let Some(md5) = md5 else {
            tracing::debug!(item = %item.id, "no hash available for post lookup");
            return Ok(None);
        };

        let Some(post) = api.find_by_md5(&md5.to_lowercase()).await? else {
            return Ok(None);
        };
        Ok(Some(to_scraped_data(
            item.kind,
            &self.site_url,
            &post.meta,
            &post.tags,
            &TagStyle::Plain,
        )))
    }
}

#[async_trait]
impl ScrapeStrategy for PostApiStrategy {
    fn info(&self) -> &Strategy {
        &self.info
    }

    async fn scrape(&self, item: &ScrapeItem) -> Result<Option<ScrapedData>, ScrapeError> {
        quiet_transient(self.scrape_inner(item).await, item)
    }
}

/// Categorised tags from the post's HTML page, with namespaced tag names.
///
/// The post id comes from the filename when it embeds one; otherwise the
/// hash is resolved through the post API, which needs credentials. Without
/// credentials, or when the page lists no tags, the item simply has no data.
pub struct PostPageStrategy {
    info: Strategy,
    page: PostPage,
    api: Option<PostApi>,
    style: TagStyle,
}

impl PostPageStrategy {
    pub fn new(page: PostPage, api: Option<PostApi>, tag_prefix: &str) -> Self {
        Self {
            info: Strategy::new(POST_PAGE_STRATEGY, POST_PAGE_STRATEGY, &[ScrapeMode::Fragment]),
            page,
            api,
            style: TagStyle::Namespaced {
                prefix: tag_prefix.to_string(),
            },
        }
    }

    async fn resolve_post(&self, item: &ScrapeItem) -> Result<Option<PostMeta>, ScrapeError> {
        match identify(item.path.as_deref(), item.checksum.as_deref()) {
            Some(PostIdentifier::PostId(id)) => {
                tracing::debug!(item = %item.id, post_id = %id, "post id from filename");
                Ok(Some(PostMeta::with_id(id)))
            }
            Some(PostIdentifier::Md5(md5)) => {
                let Some(api) = self.api.as_ref() else {
                    tracing::debug!(item = %item.id, "md5 lookup needs provider credentials");
                    return Ok(None);
                };
                Ok(api.find_by_md5(&md5).await?.map(|post| post.meta))
            }
            None => Ok(None),
        }
    }

    async fn scrape_inner(&self, item: &ScrapeItem) -> Result<Option<ScrapedData>, ScrapeError> {
        let Some(post) = self.resolve_post(item).await? else {
            return Ok(None);
        };

        let tags = match self.page.fetch_tags(&post.id).await {
            Ok(tags) => tags,
            Err(ScrapeError::NotFound) => {
                tracing::info!(post_id = %post.id, "post does not exist");
                return Ok(None);
            }
            Err(ScrapeError::ParseFailure(reason)) => {
                tracing::info!(post_id = %post.id, %reason, "no tags on post page");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Some(to_scraped_data(
            item.kind,
            self.page.site_url(),
            &post,
            &tags,
            &self.style,
        )))
    }
}

#[async_trait]
impl ScrapeStrategy for PostPageStrategy {
    fn info(&self) -> &Strategy {
        &self.info
    }

    async fn scrape(&self, item: &ScrapeItem) -> Result<Option<ScrapedData>, ScrapeError> {
        quiet_transient(self.scrape_inner(item).await, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{MockClient, MockResponse, RateLimiter, ResilientFetcher, RetryPolicy};
    use crate::provider::credentials::Credentials;
    use crate::types::ItemKind;
    use std::sync::Arc;
    use std::time::Duration;

    const SITE: &str = "https://booru.example";
    const API: &str = "https://api.booru.example";

    fn fetcher(client: MockClient) -> Arc<ResilientFetcher> {
        Arc::new(ResilientFetcher::new(
            Arc::new(client),
            RateLimiter::disabled(),
            RetryPolicy::new(3, Duration::from_secs(1)),
        ))
    }

    fn creds() -> Credentials {
        Credentials {
            api_key: "k".into(),
            user_id: "u".into(),
        }
    }

    fn item(path: &str, checksum: Option<&str>) -> ScrapeItem {
        ScrapeItem {
            id: "10".into(),
            kind: ItemKind::Image,
            title: None,
            path: Some(path.into()),
            checksum: checksum.map(str::to_string),
            tags: vec![],
            organized: false,
            added_at: None,
        }
    }

    const POST_HTML: &str = r##"<ul>
        <li class="tag-type-character tag"><a href="#">zelda</a></li>
        <li class="tag-type-general tag"><a href="#">solo</a></li>
    </ul>"##;

    #[tokio::test(start_paused = true)]
    async fn test_post_api_strategy_maps_plain_tags() {
        let client = MockClient::new().with_html(
            &format!("{API}/index.php"),
            r#"<posts><post id="3" tags="solo character:zelda" rating="e"/></posts>"#,
        );
        let f = fetcher(client);
        let strategy = PostApiStrategy::new(Some(PostApi::new(f, API, creds())), SITE);

        let data = strategy
            .scrape(&item("/x/abc.png", Some("ABC")))
            .await
            .unwrap()
            .unwrap();
        let tags: Vec<_> = data.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["solo", "explicit"]);
        assert_eq!(data.performers[0].name, "zelda");
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_api_strategy_without_credentials() {
        let strategy = PostApiStrategy::new(None, SITE);
        assert_eq!(
            strategy.scrape(&item("/x/abc.png", None)).await.unwrap_err(),
            ScrapeError::MissingCredentials
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_page_strategy_uses_filename_id() {
        let client = MockClient::new()
            .with_html(&format!("{SITE}/index.php?page=post&s=view&id=77"), POST_HTML);
        let strategy = PostPageStrategy::new(PostPage::new(fetcher(client), SITE), None, "r34");

        let data = strategy
            .scrape(&item("/x/r34_77_name.png", None))
            .await
            .unwrap()
            .unwrap();
        let tags: Vec<_> = data.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["r34:solo"]);
        assert_eq!(
            data.urls,
            vec![format!("{SITE}/index.php?page=post&s=view&id=77")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_page_strategy_quiet_on_rate_limit() {
        let client = MockClient::new().with_response(
            &format!("{SITE}/index.php?page=post&s=view&id=77"),
            MockResponse::Status(429, String::new()),
        );
        let strategy = PostPageStrategy::new(PostPage::new(fetcher(client), SITE), None, "r34");
        assert_eq!(strategy.scrape(&item("/x/r34_77.png", None)).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_page_strategy_missing_post() {
        let client = MockClient::new().with_html(
            &format!("{SITE}/index.php?page=post&s=view&id=77"),
            "<p>Nobody here but us chickens!</p>",
        );
        let strategy = PostPageStrategy::new(PostPage::new(fetcher(client), SITE), None, "r34");
        assert_eq!(strategy.scrape(&item("/x/r34_77.png", None)).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_page_strategy_md5_without_credentials() {
        let client = MockClient::new();
        let strategy = PostPageStrategy::new(PostPage::new(fetcher(client), SITE), None, "r34");
        let item = item("/x/0123456789abcdef0123456789abcdef.png", None);
        assert_eq!(strategy.scrape(&item).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_page_strategy_page_without_tags() {
        let client = MockClient::new().with_html(
            &format!("{SITE}/index.php?page=post&s=view&id=77"),
            "<html><body><div id=\"content\">An image</div></body></html>",
        );
        let strategy = PostPageStrategy::new(PostPage::new(fetcher(client), SITE), None, "r34");
        assert_eq!(strategy.scrape(&item("/x/r34_77.png", None)).await, Ok(None));
    }
}
