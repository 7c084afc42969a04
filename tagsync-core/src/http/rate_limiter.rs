//! Minimum-interval throttling for outbound requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Enforces a minimum delay between consecutive requests.
///
/// Only the time the previous `wait` returned is stored. Clones share that
/// timestamp, so fetchers built from one limiter are spaced as a single
/// sequence. Intended for a single sequential caller; the lock only keeps the
/// type `Sync`.
#[derive(Clone)]
pub struct RateLimiter {
    /// Minimum delay between requests. Zero disables throttling.
    interval: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// A limiter that never sleeps.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least `interval` has passed since the previous call returned.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.interval {
                let wait_time = self.interval - elapsed;
                tracing::debug!(wait_ms = wait_time.as_millis() as u64, "rate limiting");
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
