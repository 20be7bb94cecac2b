//! Page acquisition boundary.
//!
//! The crawler never talks to a browser engine directly. Everything goes
//! through [`PageDriver`]: navigate to a URL, evaluate a script in the page,
//! read the current URL, close the page. Each navigation yields its own
//! isolated page so DOM state never leaks between candidates.
//!
//! The only script the core evaluates is [`SNAPSHOT_SCRIPT`], which returns
//! the rendered DOM as a [`PageSnapshot`]. Classification, link discovery and
//! extraction all run on the parsed snapshot.
//!
//! Implementations:
//! - [`http::HttpPageDriver`]: static pages fetched with `reqwest`
//! - [`retry::RetryDriver`]: retries transient navigation failures

pub mod http;
pub mod retry;

use crate::error::{EvalError, NavigationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Snapshot of the rendered document.
pub const SNAPSHOT_SCRIPT: &str =
    "() => ({ url: window.location.href, html: document.documentElement.outerHTML })";

/// Opaque identifier of one open page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub u64);

/// The rendered DOM of a page, as returned by [`SNAPSHOT_SCRIPT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// URL after redirects.
    pub url: String,
    pub html: String,
}

/// Page automation capability consumed by the crawler.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Open `url` in a fresh, isolated page.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageHandle, NavigationError>;

    /// Evaluate `script` inside the page and return its JSON result.
    async fn evaluate(&self, handle: PageHandle, script: &str, args: Value) -> Result<Value, EvalError>;

    /// URL the page currently shows (after redirects).
    async fn current_url(&self, handle: PageHandle) -> Result<String, EvalError>;

    /// Release the page. Closing an unknown handle is a no-op.
    async fn close(&self, handle: PageHandle);
}

/// An open page that is closed on every exit path.
///
/// Call [`PageGuard::close`] on the normal path. If the guard is dropped
/// instead (error, timeout, cancellation), the close is spawned onto the
/// current runtime.
pub struct PageGuard {
    driver: Arc<dyn PageDriver>,
    handle: Option<PageHandle>,
}

impl PageGuard {
    /// Navigate to `url`, bounded by `nav_timeout`.
    pub async fn open(
        driver: Arc<dyn PageDriver>,
        url: &str,
        nav_timeout: Duration,
    ) -> Result<Self, NavigationError> {
        let handle = match timeout(nav_timeout, driver.navigate(url, nav_timeout)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(NavigationError::Timeout {
                    url: url.to_string(),
                    secs: nav_timeout.as_secs(),
                });
            }
        };
        debug!(%url, page = handle.0, "Page opened");
        Ok(Self { driver, handle: Some(handle) })
    }

    pub fn handle(&self) -> Option<PageHandle> {
        self.handle
    }

    /// Capture the rendered DOM, bounded by `eval_timeout`.
    pub async fn snapshot(&self, eval_timeout: Duration) -> Result<PageSnapshot, EvalError> {
        let handle = self.handle.ok_or(EvalError::PageClosed(0))?;
        let value = match timeout(
            eval_timeout,
            self.driver.evaluate(handle, SNAPSHOT_SCRIPT, Value::Null),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(EvalError::Timeout(eval_timeout.as_secs())),
        };
        let mut snapshot: PageSnapshot =
            serde_json::from_value(value).map_err(|e| EvalError::Malformed(e.to_string()))?;
        if snapshot.url.is_empty() {
            snapshot.url = self.driver.current_url(handle).await?;
        }
        Ok(snapshot)
    }

    pub async fn close(mut self) {
        if let Some(handle) = self.handle.take() {
            self.driver.close(handle).await;
            debug!(page = handle.0, "Page closed");
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let driver = Arc::clone(&self.driver);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    driver.close(handle).await;
                });
            }
            Err(_) => warn!(page = handle.0, "No runtime to close abandoned page"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPage, MockPageDriver};

    #[tokio::test]
    async fn test_guard_snapshot_and_close() {
        let driver = Arc::new(MockPageDriver::new().page(
            "https://example.com/",
            MockPage::html("<html><body><p>hi</p></body></html>"),
        ));
        let guard = PageGuard::open(driver.clone(), "https://example.com/", Duration::from_secs(5))
            .await
            .unwrap();
        let snapshot = guard.snapshot(Duration::from_secs(5)).await.unwrap();
        assert_eq!(snapshot.url, "https://example.com/");
        assert!(snapshot.html.contains("<p>hi</p>"));
        guard.close().await;
        assert_eq!(driver.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_dropped_guard_still_closes_page() {
        let driver = Arc::new(MockPageDriver::new().page("https://example.com/", MockPage::html("<p>x</p>")));
        {
            let _guard = PageGuard::open(driver.clone(), "https://example.com/", Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(driver.open_pages(), 1);
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(driver.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_navigation_timeout() {
        let driver = Arc::new(MockPageDriver::new().page("https://slow.example/", MockPage::hang()));
        let err = PageGuard::open(driver, "https://slow.example/", Duration::from_millis(20))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NavigationError::Timeout { .. }));
    }
}
