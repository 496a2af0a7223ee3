//! The knowledge index contract.

use crate::types::{BatchReport, IndexStats, SearchFilters, SimilarityHit};
use async_trait::async_trait;
use quill_common::{
    ArticleId, Content, ContentClass, ContentStyle, IndexReceipt, RawDocument, Result,
    SearchResult, Topic,
};
use std::time::Duration;
use tracing::warn;

/// Full-text search, similarity lookup and trend aggregation over collected
/// and processed content.
///
/// An unavailable backend reports
/// [`QuillError::IndexBackendUnavailable`](quill_common::QuillError::IndexBackendUnavailable).
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Ranked matches for `query`. Zero-relevance documents are dropped.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Processed content scoring at least `threshold` against `reference`,
    /// best first.
    async fn similarity(
        &self,
        reference: &Content,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>>;

    /// Topics built from domain terms mentioned in raw documents collected
    /// inside `window`, highest trend score first.
    async fn trending(&self, window: Duration, limit: usize) -> Result<Vec<Topic>>;

    async fn index_raw(&self, document: RawDocument) -> Result<()>;

    /// Index finished content. The receipt is what allows publication.
    async fn index_processed(
        &self,
        article_id: &ArticleId,
        content: &Content,
        topic: &Topic,
        style: ContentStyle,
        quality_score: f64,
    ) -> Result<IndexReceipt>;

    async fn index_topic(&self, topic: &Topic) -> Result<()>;

    async fn stats(&self) -> Result<IndexStats>;

    /// Index every document, counting failures instead of stopping.
    async fn index_raw_batch(&self, documents: Vec<RawDocument>) -> BatchReport {
        let mut report = BatchReport::default();
        for document in documents {
            let id = document.id.clone();
            match self.index_raw(document).await {
                Ok(()) => report.success += 1,
                Err(e) => {
                    warn!(document_id = %id, error = %e, "Failed to index raw document");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Processed content in the topic's category written in `style`.
    async fn content_suggestions(
        &self,
        topic: &Topic,
        style: ContentStyle,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let filters = SearchFilters::default()
            .category(topic.category())
            .style(style)
            .content_class(ContentClass::Processed);
        self.search(&topic.query_string(), &filters, limit).await
    }
}
