//! Detection-driven strategy used for every site without a named handler.

use crate::strategies::SiteStrategy;

/// Classifier, link scorer and content extractor composed with no
/// site-specific tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericStrategy;

impl SiteStrategy for GenericStrategy {
    fn name(&self) -> &'static str {
        "generic"
    }
}
