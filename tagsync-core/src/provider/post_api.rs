//! The provider's XML post API, queried by content hash.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::ScrapeError;
use crate::http::{FetchRequest, ResilientFetcher};

use super::credentials::Credentials;
use super::mapping::{parse_tag_string, PostMeta, TagCategories};

#[derive(Debug, Deserialize)]
struct PostsXml {
    #[serde(rename = "post", default)]
    posts: Vec<PostXml>,
}

#[derive(Debug, Deserialize)]
struct PostXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@tags", default)]
    tags: String,
    #[serde(rename = "@score")]
    score: Option<String>,
    #[serde(rename = "@rating")]
    rating: Option<String>,
    #[serde(rename = "@width")]
    width: Option<String>,
    #[serde(rename = "@height")]
    height: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

/// A post returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub meta: PostMeta,
    pub tags: TagCategories,
}

/// Parse an API response; the first `<post>` wins.
pub fn parse_posts(xml: &str) -> Result<Option<PostRecord>, ScrapeError> {
    let parsed: PostsXml = quick_xml::de::from_str(xml)
        .map_err(|e| ScrapeError::ParseFailure(format!("post API response: {e}")))?;

    Ok(parsed.posts.into_iter().next().map(|post| PostRecord {
        tags: parse_tag_string(&post.tags),
        meta: PostMeta {
            id: post.id,
            score: post.score,
            rating: post.rating,
            width: post.width,
            height: post.height,
            title: post.title,
        },
    }))
}

pub struct PostApi {
    fetcher: Arc<ResilientFetcher>,
    api_url: String,
    credentials: Credentials,
}

impl PostApi {
    pub fn new(fetcher: Arc<ResilientFetcher>, api_url: &str, credentials: Credentials) -> Self {
        Self {
            fetcher,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Look a post up by md5. `Ok(None)` when the API knows no such post.
    pub async fn find_by_md5(&self, md5: &str) -> Result<Option<PostRecord>, ScrapeError> {
        tracing::debug!(md5, "querying post API");

        let request = FetchRequest::get(format!("{}/index.php", self.api_url))
            .query("page", "dapi")
            .query("s", "post")
            .query("q", "index")
            .query("tags", format!("md5:{md5}"))
            .query("api_key", self.credentials.api_key.as_str())
            .query("user_id", self.credentials.user_id.as_str());

        let body = self.fetcher.fetch(&request).await.into_text()?;
        let record = parse_posts(&body)?;
        if record.is_none() {
            tracing::debug!(md5, "no post for hash");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{MockClient, RateLimiter, RetryPolicy};
    use std::time::Duration;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<posts count="1" offset="0">
  <post id="4242" tags=" 1girls character:samus_aran artist:painter copyright:metroid " score="17" rating="s" width="800" height="600" file_url="https://x/y.png"/>
</posts>"#;

    #[test]
    fn test_parse_first_post() {
        let record = parse_posts(RESPONSE).unwrap().unwrap();
        assert_eq!(record.meta.id, "4242");
        assert_eq!(record.meta.score.as_deref(), Some("17"));
        assert_eq!(record.meta.title, None);
        assert_eq!(record.tags.characters, vec!["samus aran"]);
        assert_eq!(record.tags.general, vec!["1girls"]);
    }

    #[test]
    fn test_parse_no_posts() {
        assert_eq!(parse_posts(r#"<posts count="0" offset="0"></posts>"#).unwrap(), None);
        assert_eq!(parse_posts(r#"<posts count="0" offset="0"/>"#).unwrap(), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_posts("Missing authentication"),
            Err(ScrapeError::ParseFailure(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_by_md5_sends_credentials() {
        let client = Arc::new(MockClient::new().with_html("https://api.booru.example/index.php", RESPONSE));
        let fetcher = Arc::new(ResilientFetcher::new(
            client.clone(),
            RateLimiter::disabled(),
            RetryPolicy::new(3, Duration::from_secs(1)),
        ));
        let api = PostApi::new(
            fetcher,
            "https://api.booru.example/",
            Credentials {
                api_key: "k".into(),
                user_id: "u".into(),
            },
        );

        let record = api.find_by_md5("abc").await.unwrap().unwrap();
        assert_eq!(record.meta.id, "4242");

        let sent = client.requests();
        let url = sent[0].full_url().unwrap();
        assert!(url.contains("tags=md5%3Aabc"));
        assert!(url.contains("api_key=k"));
        assert!(url.contains("user_id=u"));
    }
}
