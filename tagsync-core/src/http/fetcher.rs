//! Single-request fetch with outcome classification and retry.
//!
//! Retry schedule: every transient outcome (429, 5xx, other non-2xx, timeout,
//! connection error) sleeps `base_delay * 2^k` after 0-indexed attempt `k`.
//! There is no sleep after the final attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::{ScrapeError, TransportError};

use super::charset::decode_bytes_to_utf8;
use super::client::{FetchRequest, HttpClient, RawResponse};
use super::rate_limiter::RateLimiter;

/// How many times to try a request and how long to back off between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Store and post-page requests during bulk runs.
    pub fn bulk() -> Self {
        Self::new(3, Duration::from_secs(1))
    }

    /// Wiki search and page fetches.
    pub fn wiki() -> Self {
        Self::new(5, Duration::from_secs(2))
    }

    /// Delay after 0-indexed attempt `attempt` fails transiently.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bulk()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    PermanentFailure,
    TransientFailure,
}

/// The final result of a fetch, after any retries.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: FetchStatus,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub detail: String,
    /// HTTP status of the last attempt, if one completed.
    pub http_status: Option<u16>,
    pub attempts: u32,
    /// Total time spent sleeping between attempts.
    pub backoff: Duration,
    error: Option<ScrapeError>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Transient failure that used up every attempt.
    pub fn is_exhausted(&self) -> bool {
        self.status == FetchStatus::TransientFailure
    }

    /// The classified failure, if any.
    pub fn error(&self) -> Option<&ScrapeError> {
        self.error.as_ref()
    }

    pub fn text(&self) -> String {
        decode_bytes_to_utf8(&self.body, self.content_type.as_deref())
    }

    /// Body text on success, otherwise the classified failure.
    pub fn into_text(self) -> Result<String, ScrapeError> {
        match self.status {
            FetchStatus::Success => Ok(self.text()),
            _ => Err(self
                .error
                .unwrap_or_else(|| ScrapeError::NetworkError(self.detail))),
        }
    }
}

/// What one attempt amounted to.
enum Attempt {
    Success(RawResponse),
    Permanent(Option<u16>, ScrapeError),
    Transient(Option<u16>, ScrapeError),
}

fn classify(result: Result<RawResponse, TransportError>, markers: &[String]) -> Attempt {
    let response = match result {
        Ok(r) => r,
        Err(TransportError::InvalidUrl(msg)) => {
            return Attempt::Permanent(None, ScrapeError::InvalidRequest(msg))
        }
        Err(e) => return Attempt::Transient(None, ScrapeError::NetworkError(e.to_string())),
    };

    let status = response.status;
    match status {
        200..=299 => {
            if !markers.is_empty() {
                let text = response.text();
                if markers.iter().any(|m| text.contains(m.as_str())) {
                    return Attempt::Permanent(Some(status), ScrapeError::NotFound);
                }
            }
            Attempt::Success(response)
        }
        404 => Attempt::Permanent(Some(status), ScrapeError::NotFound),
        429 => Attempt::Transient(Some(status), ScrapeError::RateLimited),
        500..=599 => Attempt::Transient(Some(status), ScrapeError::ServerError(status)),
        _ => Attempt::Transient(Some(status), ScrapeError::HttpStatus(status)),
    }
}

/// Sends requests through a rate limiter and retries transient failures.
pub struct ResilientFetcher {
    client: Arc<dyn HttpClient>,
    limiter: RateLimiter,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(client: Arc<dyn HttpClient>, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch once, retrying transient failures per the retry policy.
    ///
    /// Every attempt waits on the rate limiter first.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = Duration::ZERO;
        let mut attempt = 0;

        loop {
            self.limiter.wait().await;
            let result = self.client.send(request).await;
            attempt += 1;

            match classify(result, &request.not_found_markers) {
                Attempt::Success(response) => {
                    return FetchOutcome {
                        status: FetchStatus::Success,
                        detail: format!("HTTP {}", response.status),
                        http_status: Some(response.status),
                        body: response.body,
                        content_type: response.content_type,
                        attempts: attempt,
                        backoff,
                        error: None,
                    };
                }
                Attempt::Permanent(http_status, error) => {
                    tracing::debug!(url = %request.url, error = %error, "permanent failure, not retrying");
                    return FetchOutcome {
                        status: FetchStatus::PermanentFailure,
                        body: Vec::new(),
                        content_type: None,
                        detail: error.to_string(),
                        http_status,
                        attempts: attempt,
                        backoff,
                        error: Some(error),
                    };
                }
                Attempt::Transient(http_status, error) => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            url = %request.url,
                            attempts = attempt,
                            error = %error,
                            "transient failures persist, giving up"
                        );
                        return FetchOutcome {
                            status: FetchStatus::TransientFailure,
                            body: Vec::new(),
                            content_type: None,
                            detail: error.to_string(),
                            http_status,
                            attempts: attempt,
                            backoff,
                            error: Some(error),
                        };
                    }

                    let delay = self.policy.delay_for(attempt - 1);
                    tracing::info!(
                        url = %request.url,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                    backoff += delay;
                }
            }
        }
    }
}
