//! Search projections and raw collected documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an indexed document is collected source material or a finished article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    Raw,
    Processed,
}

/// Read-only projection returned by a knowledge index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content_id: String,
    pub title: String,
    pub body: String,
    pub relevance_score: f64,
    pub content_class: ContentClass,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_info: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SearchResult {
    /// The first `n` whitespace-separated words of the body.
    pub fn body_prefix(&self, n: usize) -> impl Iterator<Item = &str> {
        self.body.split_whitespace().take(n)
    }
}

/// Source material handed to the index by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default = "new_document_id")]
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub collected_at: DateTime<Utc>,
}

fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl RawDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: new_document_id(),
            title: title.into(),
            body: body.into(),
            url: String::new(),
            source_id: String::new(),
            category: None,
            metadata: serde_json::Map::new(),
            collected_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self.url = url.into();
        self
    }

    pub fn collected_at(mut self, at: DateTime<Utc>) -> Self {
        self.collected_at = at;
        self
    }
}
