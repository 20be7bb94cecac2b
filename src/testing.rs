//! Scripted in-memory [`PageDriver`] for tests.
//!
//! Pages are registered per exact URL. Unknown URLs answer HTTP 404.

use crate::driver::{PageDriver, PageHandle, PageSnapshot, SNAPSHOT_SCRIPT};
use crate::error::{EvalError, NavigationError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    html: String,
    latency: Option<Duration>,
    eval_latency: Option<Duration>,
    hang: bool,
    fail_first: usize,
    eval_error: bool,
}

impl MockPage {
    pub fn html(html: impl Into<String>) -> Self {
        Self { html: html.into(), ..Self::default() }
    }

    /// Navigation never completes.
    pub fn hang() -> Self {
        Self { hang: true, ..Self::default() }
    }

    /// Navigation succeeds after `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The page opens at once but its snapshot takes `latency`.
    pub fn eval_latency(mut self, latency: Duration) -> Self {
        self.eval_latency = Some(latency);
        self
    }

    /// The first `n` navigations fail as unreachable.
    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Every evaluation throws.
    pub fn eval_error(mut self) -> Self {
        self.eval_error = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct MockPageDriver {
    pages: HashMap<String, MockPage>,
    attempts: DashMap<String, usize>,
    open: DashMap<u64, String>,
    next_id: AtomicU64,
    navigations: AtomicUsize,
}

impl MockPageDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: MockPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Pages navigated but not yet closed.
    pub fn open_pages(&self) -> usize {
        self.open.len()
    }

    /// Total navigation attempts.
    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<PageHandle, NavigationError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let Some(page) = self.pages.get(url) else {
            return Err(NavigationError::Status { url: url.to_string(), status: 404 });
        };
        if page.hang {
            std::future::pending::<()>().await;
        }
        if let Some(latency) = page.latency {
            tokio::time::sleep(latency).await;
        }
        let attempt = {
            let mut entry = self.attempts.entry(url.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if attempt <= page.fail_first {
            return Err(NavigationError::Unreachable {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.open.insert(id, url.to_string());
        Ok(PageHandle(id))
    }

    async fn evaluate(&self, handle: PageHandle, script: &str, _args: Value) -> Result<Value, EvalError> {
        let url = self
            .open
            .get(&handle.0)
            .map(|u| u.value().clone())
            .ok_or(EvalError::PageClosed(handle.0))?;
        let page = self.pages.get(&url).ok_or(EvalError::PageClosed(handle.0))?;
        if let Some(latency) = page.eval_latency {
            tokio::time::sleep(latency).await;
        }
        if page.eval_error {
            return Err(EvalError::Script("TypeError: document is null".to_string()));
        }
        if script != SNAPSHOT_SCRIPT {
            return Err(EvalError::Unsupported);
        }
        serde_json::to_value(PageSnapshot { url, html: page.html.clone() })
            .map_err(|e| EvalError::Malformed(e.to_string()))
    }

    async fn current_url(&self, handle: PageHandle) -> Result<String, EvalError> {
        self.open
            .get(&handle.0)
            .map(|u| u.value().clone())
            .ok_or(EvalError::PageClosed(handle.0))
    }

    async fn close(&self, handle: PageHandle) {
        self.open.remove(&handle.0);
    }
}
