//! Navigation retry with exponential backoff.
//!
//! [`RetryDriver`] decorates any [`PageDriver`] and retries navigations that
//! failed for transient reasons (unreachable host, HTTP 429/5xx). Timeouts,
//! client errors and cancellation are returned immediately.
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::driver::{PageDriver, PageHandle};
use crate::error::{EvalError, NavigationError};
use async_trait::async_trait;
use rand::{Rng, rng};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

pub struct RetryDriver<D> {
    inner: D,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<D> RetryDriver<D>
where
    D: PageDriver,
{
    /// Wrap `inner`, retrying transient navigation failures up to `max_retries` times.
    pub fn new(inner: D, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<D> fmt::Debug for RetryDriver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryDriver")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<D> PageDriver for RetryDriver<D>
where
    D: PageDriver,
{
    #[instrument(level = "info", skip(self, timeout))]
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageHandle, NavigationError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.navigate(url, timeout).await {
                Ok(handle) => return Ok(handle),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "navigate() exhausted retries"
                        );
                        return Err(e);
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "navigate() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn evaluate(&self, handle: PageHandle, script: &str, args: Value) -> Result<Value, EvalError> {
        self.inner.evaluate(handle, script, args).await
    }

    async fn current_url(&self, handle: PageHandle) -> Result<String, EvalError> {
        self.inner.current_url(handle).await
    }

    async fn close(&self, handle: PageHandle) {
        self.inner.close(handle).await
    }
}
