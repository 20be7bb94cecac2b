//! # Dynamic Crawl
//!
//! Discovers recently published articles on arbitrary web pages, extracts
//! their main text and media, and normalizes heterogeneous publication dates
//! so stories can be filtered by a time window.
//!
//! ## Pipeline
//!
//! ```text
//! CrawlOrchestrator
//!   -> SiteStrategy (generic or named, resolved by domain)
//!        -> listing page -> SiteClassifier -> LinkScorer
//!        -> per candidate: ContentExtractor + MediaUrlExtractor
//!                          -> DateNormalizer -> DateRelevanceFilter
//!   -> Story -> CrawlResult
//! ```
//!
//! Pages are acquired through the [`driver::PageDriver`] trait; the crate
//! ships a static HTTP driver and a retrying decorator.

pub mod classifier;
pub mod config;
pub mod dates;
pub mod detect;
pub mod driver;
pub mod error;
pub mod extract;
pub mod links;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod outputs;
pub mod strategies;
pub mod utils;

#[cfg(test)]
pub mod testing;
