//! Turning flags and environment into clients and run options.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tagsync_core::http::{RateLimiter, ReqwestClient, ResilientFetcher, RetryPolicy};
use tagsync_core::orchestrator::{parse_date, DateFilter, ScrapeStrategy};
use tagsync_core::provider::post_api::PostApi;
use tagsync_core::provider::{Credentials, PostApiStrategy, PostPage, PostPageStrategy, WikiScraper};
use tagsync_core::store::{GraphqlStore, TimestampKind};

pub const USER_AGENT: &str = "tagsync/0.1 (bulk scraper)";
pub const WIKI_USER_AGENT: &str = "tagsync/0.1 (tag description sync)";

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]", "0.0.0.0"];

/// Whether the store lives on this machine, which allows faster defaults.
pub fn is_localhost(store_url: &str) -> bool {
    url::Url::parse(store_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|host| LOCAL_HOSTS.contains(&host.as_str()))
}

/// Network tuning shared by every command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSettings {
    /// Minimum seconds between scrapes.
    pub rate_limit: f64,
    pub timeout: Duration,
    /// Total attempts per request.
    pub max_attempts: u32,
}

impl NetworkSettings {
    /// Bulk runs: fast against a local store, gentler against a remote one.
    pub fn for_store(store_url: &str) -> Self {
        if is_localhost(store_url) {
            Self {
                rate_limit: 0.5,
                timeout: Duration::from_secs(30),
                max_attempts: 1,
            }
        } else {
            Self {
                rate_limit: 2.0,
                timeout: Duration::from_secs(60),
                max_attempts: 3,
            }
        }
    }

    /// Description sync talks to the provider wiki for every tag.
    pub fn for_wiki() -> Self {
        Self {
            rate_limit: 1.0,
            timeout: Duration::from_secs(30),
            max_attempts: 5,
        }
    }

    /// Explicit flags win over the defaults.
    pub fn with_overrides(
        mut self,
        rate_limit: Option<f64>,
        timeout: Option<u64>,
        max_retries: Option<u32>,
    ) -> Self {
        if let Some(rate) = rate_limit {
            self.rate_limit = rate.max(0.0);
        }
        if let Some(secs) = timeout {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = max_retries {
            self.max_attempts = attempts.max(1);
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit)
    }

    fn fetcher(&self, user_agent: &str, limiter: RateLimiter) -> Result<Arc<ResilientFetcher>> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Arc::new(ResilientFetcher::new(
            Arc::new(client),
            limiter,
            RetryPolicy::new(self.max_attempts, Duration::from_secs(2)),
        )))
    }

    /// Fetcher without throttling, for store lookups and updates.
    pub fn unthrottled_fetcher(&self, user_agent: &str) -> Result<Arc<ResilientFetcher>> {
        self.fetcher(user_agent, RateLimiter::disabled())
    }

    /// Fetcher with its own limiter at this interval.
    pub fn throttled_fetcher(&self, user_agent: &str) -> Result<Arc<ResilientFetcher>> {
        self.fetcher(user_agent, RateLimiter::new(self.interval()))
    }

    /// Fetcher spaced together with every other fetcher on `limiter`.
    pub fn shared_fetcher(
        &self,
        user_agent: &str,
        limiter: &RateLimiter,
    ) -> Result<Arc<ResilientFetcher>> {
        self.fetcher(user_agent, limiter.clone())
    }
}

/// Where the metadata store is and how to authenticate.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub api_key: Option<String>,
}

impl StoreSettings {
    /// Scrape requests go through `scrape_limiter` when one is given; every
    /// other store call is unthrottled.
    pub fn connect(
        &self,
        network: &NetworkSettings,
        timestamps: Option<TimestampKind>,
        scrape_limiter: Option<&RateLimiter>,
    ) -> Result<GraphqlStore> {
        let fetcher = network.unthrottled_fetcher(USER_AGENT)?;
        let mut store = GraphqlStore::new(fetcher, &self.url, self.api_key.clone());
        if let Some(kind) = timestamps {
            store = store.with_timestamps(kind);
        }
        if let Some(limiter) = scrape_limiter {
            store = store.with_scrape_fetcher(network.shared_fetcher(USER_AGENT, limiter)?);
        }
        Ok(store)
    }
}

/// Provider endpoints and credentials for the built-in strategies.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub site_url: String,
    pub api_url: String,
    pub tag_prefix: String,
    pub credentials: Option<Credentials>,
}

impl ProviderSettings {
    pub fn post_api(&self, fetcher: &Arc<ResilientFetcher>) -> Option<PostApi> {
        self.credentials
            .clone()
            .map(|c| PostApi::new(fetcher.clone(), &self.api_url, c))
    }

    pub fn post_api_strategy(&self, fetcher: &Arc<ResilientFetcher>) -> PostApiStrategy {
        PostApiStrategy::new(self.post_api(fetcher), &self.site_url)
    }

    pub fn post_page_strategy(&self, fetcher: &Arc<ResilientFetcher>) -> PostPageStrategy {
        PostPageStrategy::new(
            PostPage::new(fetcher.clone(), &self.site_url),
            self.post_api(fetcher),
            &self.tag_prefix,
        )
    }

    /// Built-in strategies worth offering: the API one only with credentials.
    pub fn builtin_strategies(&self, fetcher: &Arc<ResilientFetcher>) -> Vec<Arc<dyn ScrapeStrategy>> {
        let mut strategies: Vec<Arc<dyn ScrapeStrategy>> = Vec::new();
        if self.credentials.is_some() {
            strategies.push(Arc::new(self.post_api_strategy(fetcher)));
        } else {
            tracing::info!("no provider credentials; md5 lookups are unavailable");
        }
        strategies.push(Arc::new(self.post_page_strategy(fetcher)));
        strategies
    }

    pub fn wiki(&self, fetcher: Arc<ResilientFetcher>) -> WikiScraper {
        WikiScraper::new(fetcher, &self.site_url)
    }
}

/// Parse `--since`, `--before` and `--between` into one filter.
pub fn date_filter(
    since: Option<&str>,
    before: Option<&str>,
    between: Option<&[String]>,
) -> Result<DateFilter> {
    let parse = |s: &str| -> Result<NaiveDate> { Ok(parse_date(s)?) };
    let between = match between {
        Some([start, end]) => Some((parse(start.as_str())?, parse(end.as_str())?)),
        Some(other) => anyhow::bail!("--between takes exactly two dates, got {}", other.len()),
        None => None,
    };
    let since = since.map(parse).transpose()?;
    let before = before.map(parse).transpose()?;
    Ok(DateFilter::combine(between, since, before)?)
}

/// Split a comma-separated `--tags` value.
pub fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_detection() {
        assert!(is_localhost("http://localhost:9999"));
        assert!(is_localhost("http://127.0.0.1:9999/"));
        assert!(is_localhost("http://[::1]:9999"));
        assert!(is_localhost("http://0.0.0.0:9999"));
        assert!(!is_localhost("https://stash.example.com"));
        assert!(!is_localhost("not a url"));
    }

    #[test]
    fn test_defaults_follow_store_location() {
        let local = NetworkSettings::for_store("http://localhost:9999");
        assert_eq!(local.rate_limit, 0.5);
        assert_eq!(local.max_attempts, 1);
        assert_eq!(local.timeout, Duration::from_secs(30));

        let remote = NetworkSettings::for_store("https://stash.example.com");
        assert_eq!(remote.rate_limit, 2.0);
        assert_eq!(remote.max_attempts, 3);
        assert_eq!(remote.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_explicit_flags_override_defaults() {
        let settings =
            NetworkSettings::for_store("http://localhost:9999").with_overrides(Some(3.0), None, Some(4));
        assert_eq!(settings.rate_limit, 3.0);
        assert_eq!(settings.max_attempts, 4);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_date_filter_from_flags() {
        let between = vec!["2024-01-01".to_string(), "2024-01-31".to_string()];
        let filter = date_filter(Some("2024-01-10"), None, Some(&between)).unwrap();
        assert_eq!(filter.since, parse_date("2024-01-10").ok());
        assert_eq!(filter.before, parse_date("2024-01-31").ok());

        assert!(date_filter(Some("2024-02-01"), Some("2024-01-01"), None).is_err());
        assert!(date_filter(Some("January 1"), None, None).is_err());
    }

    #[test]
    fn test_split_names() {
        assert_eq!(split_names(" samus aran, ,link "), vec!["samus aran", "link"]);
    }
}
