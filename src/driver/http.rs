//! Static-page driver backed by `reqwest`.
//!
//! Fetches the raw HTML of a page without running any JavaScript. Good enough
//! for server-rendered news sites and blogs; pages that render client-side
//! need a browser-backed [`PageDriver`].

use crate::driver::{PageDriver, PageHandle, PageSnapshot, SNAPSHOT_SCRIPT};
use crate::error::{EvalError, NavigationError};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug)]
pub struct HttpPageDriver {
    client: Client,
    pages: DashMap<u64, PageSnapshot>,
    next_id: AtomicU64,
}

impl HttpPageDriver {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            pages: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    #[instrument(level = "debug", skip(self, timeout))]
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageHandle, NavigationError> {
        let parsed = Url::parse(url).map_err(|_| NavigationError::InvalidUrl(url.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Non-success status");
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| map_transport_error(url, timeout, e))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(%url, %final_url, bytes = html.len(), page = id, "Fetched page");
        self.pages.insert(id, PageSnapshot { url: final_url, html });
        Ok(PageHandle(id))
    }

    async fn evaluate(&self, handle: PageHandle, script: &str, _args: Value) -> Result<Value, EvalError> {
        if script != SNAPSHOT_SCRIPT {
            return Err(EvalError::Unsupported);
        }
        let page = self.pages.get(&handle.0).ok_or(EvalError::PageClosed(handle.0))?;
        serde_json::to_value(page.value()).map_err(|e| EvalError::Malformed(e.to_string()))
    }

    async fn current_url(&self, handle: PageHandle) -> Result<String, EvalError> {
        self.pages
            .get(&handle.0)
            .map(|page| page.url.clone())
            .ok_or(EvalError::PageClosed(handle.0))
    }

    async fn close(&self, handle: PageHandle) {
        self.pages.remove(&handle.0);
    }
}

fn map_transport_error(url: &str, timeout: Duration, e: reqwest::Error) -> NavigationError {
    if e.is_timeout() {
        NavigationError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        NavigationError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
