//! Output generation for crawl results.
//!
//! # Submodules
//!
//! - [`json`]: Writes the list of `CrawlResult` records as one JSON file
//!
//! # Output Structure
//!
//! ```text
//! [
//!   { "source": "...", "stories": [...], "error": null, "siteInfo": {...}, "skipped": [...] },
//!   ...
//! ]
//! ```

pub mod json;
