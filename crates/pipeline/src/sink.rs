//! Destinations for published articles.

use async_trait::async_trait;
use quill_common::{Article, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::schema::{expected_schema, PropertyKind};

/// A document workspace that receives published articles.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    /// Property names and types the sink currently accepts.
    async fn schema(&self) -> Result<HashMap<String, PropertyKind>>;

    /// Store `article` with its mapped `properties`. Returns the sink's
    /// identifier for the stored document.
    async fn publish(&self, article: &Article, properties: Map<String, Value>) -> Result<String>;

    fn name(&self) -> &str;
}

/// Writes one `{article_id}.json` document per article into a directory.
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl ArticleSink for DirectorySink {
    async fn schema(&self) -> Result<HashMap<String, PropertyKind>> {
        Ok(expected_schema())
    }

    async fn publish(&self, article: &Article, properties: Map<String, Value>) -> Result<String> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(format!("{}.json", article.id));
        let document = json!({
            "properties": properties,
            "article": article,
        });
        tokio::fs::write(&path, serde_json::to_vec_pretty(&document)?).await?;
        debug!(path = %path.display(), "Article written");
        Ok(path.display().to_string())
    }

    fn name(&self) -> &str {
        "directory"
    }
}
