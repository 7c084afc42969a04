//! HTTP client trait and implementations.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::TransportError;

use super::charset::decode_bytes_to_utf8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound request, independent of the client that sends it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
    /// Body fragments that mark a 2xx page as "entity does not exist".
    pub not_found_markers: Vec<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            json_body: None,
            not_found_markers: Vec::new(),
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            json_body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn not_found_marker(mut self, marker: &str) -> Self {
        self.not_found_markers.push(marker.to_string());
        self
    }

    /// The URL with query parameters applied.
    pub fn full_url(&self) -> Result<String, TransportError> {
        let parsed = if self.query.is_empty() {
            url::Url::parse(&self.url)
        } else {
            url::Url::parse_with_params(&self.url, &self.query)
        };
        parsed
            .map(|u| u.to_string())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", self.url, e)))
    }
}

/// Status, content type and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn text(&self) -> String {
        decode_bytes_to_utf8(&self.body, self.content_type.as_deref())
    }
}

/// Trait for HTTP clients, enabling mockability in tests.
///
/// Implementations report every HTTP status as a response; only failures to
/// complete the exchange are errors. Classification happens in the fetcher.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError>;
}

/// Configuration for ReqwestClient.
#[derive(Clone)]
pub struct ReqwestClientBuilder {
    timeout: Duration,
    user_agent: String,
}

impl Default for ReqwestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestClientBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "tagsync/0.1 (tag metadata sync)".to_string(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<ReqwestClient, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;
        Ok(ReqwestClient { inner })
    }
}

/// Production HTTP client backed by reqwest.
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        ReqwestClientBuilder::new().build()
    }

    pub fn builder() -> ReqwestClientBuilder {
        ReqwestClientBuilder::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = match request.method {
            Method::Get => self.inner.get(url),
            Method::Post => self.inner.post(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?.to_vec();

        tracing::debug!(url = %request.url, status, bytes = body.len(), "network: response");

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Mock response for testing.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// 200 with an HTML body.
    Html(String),
    /// Arbitrary status and body.
    Status(u16, String),
    /// The exchange itself fails.
    Error(TransportError),
}

/// Mock HTTP client for testing.
///
/// Each URL holds a queue of responses; the last queued response repeats once
/// the others are used up. Sent requests are recorded in order.
pub struct MockClient {
    responses: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for a URL. Keys match either the full URL with query
    /// string or the bare URL.
    pub fn with_response(self, url: &str, response: MockResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(url.to_string())
                .or_default()
                .push_back(response);
        }
        self
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(url, MockResponse::Html(html.to_string()))
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, MockResponse::Status(status, String::new()))
    }

    pub fn with_sequence(self, url: &str, sequence: Vec<MockResponse>) -> Self {
        sequence
            .into_iter()
            .fold(self, |client, response| client.with_response(url, response))
    }

    /// Requests sent so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_response(&self, request: &FetchRequest) -> Option<MockResponse> {
        let mut responses = self.responses.lock().ok()?;
        let full = request.full_url().ok();
        let key = full
            .filter(|u| responses.contains_key(u))
            .unwrap_or_else(|| request.url.clone());
        let queue = responses.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match self.next_response(request) {
            Some(MockResponse::Html(html)) => Ok(RawResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: html.into_bytes(),
            }),
            Some(MockResponse::Status(status, body)) => Ok(RawResponse::new(status, body)),
            Some(MockResponse::Error(e)) => Err(e),
            None => Ok(RawResponse::new(404, format!("No mock response for URL: {}", request.url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_encodes_query() {
        let request = FetchRequest::get("https://example.com/index.php")
            .query("page", "wiki")
            .query("search", "blue eyes");
        assert_eq!(
            request.full_url().unwrap(),
            "https://example.com/index.php?page=wiki&search=blue+eyes"
        );
    }

    #[test]
    fn test_full_url_rejects_garbage() {
        let request = FetchRequest::get("not a url");
        assert!(matches!(
            request.full_url(),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_replays_sequence_then_repeats_last() {
        let client = MockClient::new().with_sequence(
            "https://example.com/",
            vec![
                MockResponse::Status(429, String::new()),
                MockResponse::Html("ok".to_string()),
            ],
        );
        let request = FetchRequest::get("https://example.com/");

        assert_eq!(client.send(&request).await.unwrap().status, 429);
        assert_eq!(client.send(&request).await.unwrap().status, 200);
        assert_eq!(client.send(&request).await.unwrap().status, 200);
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_matches_full_url_before_bare_url() {
        let client = MockClient::new()
            .with_html("https://example.com/?id=1", "one")
            .with_html("https://example.com/", "any");

        let one = FetchRequest::get("https://example.com/").query("id", "1");
        let two = FetchRequest::get("https://example.com/").query("id", "2");

        assert_eq!(client.send(&one).await.unwrap().text(), "one");
        assert_eq!(client.send(&two).await.unwrap().text(), "any");
    }

    #[tokio::test]
    async fn test_mock_unknown_url_is_404() {
        let client = MockClient::new();
        let response = client
            .send(&FetchRequest::get("https://example.com/missing"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }
}
