//! Downstream categorization hook.
//!
//! The crawler does not categorize content itself. When a [`Classifier`] is
//! attached, every accepted story's text is sent to it and the returned
//! categories become the story's tags.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub text: String,
    pub candidate_categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub main_category: String,
    pub confidence: f32,
    #[serde(default)]
    pub sub_categories: Vec<String>,
    #[serde(default)]
    pub related_topics: Vec<String>,
}

impl Classification {
    /// Main category, then sub-categories, then related topics; blanks and
    /// repeats dropped.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let all = std::iter::once(&self.main_category)
            .chain(&self.sub_categories)
            .chain(&self.related_topics);
        for tag in all {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<Classification, Box<dyn Error + Send + Sync>>;
}
