//! Query filters and result types.

use chrono::{DateTime, Utc};
use quill_common::{ContentClass, Content, ContentStyle, Topic};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hard constraints applied to a search. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_class: Option<ContentClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ContentStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl SearchFilters {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into().to_lowercase());
        self
    }

    pub fn content_class(mut self, class: ContentClass) -> Self {
        self.content_class = Some(class);
        self
    }

    pub fn style(mut self, style: ContentStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Stable text form, used as a cache identifier.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Processed content found similar to a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub content_id: String,
    pub score: f64,
    pub content: Content,
    pub topic: Topic,
    pub style: ContentStyle,
}

/// Result of a batch raw ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub success: usize,
    pub failed: usize,
}

/// Document counts per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub raw_documents: usize,
    pub processed_documents: usize,
    pub topics: usize,
}

/// Configuration for the in-process index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    /// JSON snapshot loaded at startup, merged on flush and written through
    /// on every processed-content write
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}
