//! JSON output of crawl results.
//!
//! Results are written as a pretty-printed list of [`CrawlResult`] records.
//! The file is first written next to its destination and then renamed into
//! place, so an interrupted run never leaves a truncated file behind.

use crate::error::OutputError;
use crate::models::CrawlResult;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Sibling temporary path for `path`: `results.json` -> `.results.json.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "crawl_results.json".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(tmp, bytes).await?;
    fs::rename(tmp, path).await
}

/// Write `results` to `path` atomically.
///
/// # Errors
///
/// Returns an [`OutputError`] if serialization, the temporary write, or the
/// rename fails. The temporary file is removed on either failure.
#[instrument(level = "info", skip_all, fields(path = %path.display(), sources = results.len()))]
pub async fn write_results(results: &[CrawlResult], path: &Path) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    if let Err(e) = write_then_rename(&tmp, path, json.as_bytes()).await {
        error!(tmp = %tmp.display(), error = %e, "Failed to write results; removing temporary file");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(bytes = json.len(), "Wrote crawl results");
    Ok(())
}
