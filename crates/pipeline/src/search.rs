//! Knowledge index searches memoized in the search-results cache class.

use quill_cache::{CacheClass, CacheManager, ClearReport};
use quill_common::{Result, SearchResult};
use quill_index::{KnowledgeIndex, SearchFilters};
use std::sync::Arc;
use tracing::{debug, info};

/// Searches go to the cache first; a miss queries the index and stores the
/// result under the search-results TTL policy.
#[derive(Clone)]
pub struct CachedSearch {
    index: Arc<dyn KnowledgeIndex>,
    cache: Arc<CacheManager>,
}

impl CachedSearch {
    pub fn new(index: Arc<dyn KnowledgeIndex>, cache: Arc<CacheManager>) -> Self {
        Self { index, cache }
    }

    pub fn index(&self) -> &Arc<dyn KnowledgeIndex> {
        &self.index
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let id = format!("{query}|{}|{limit}", filters.cache_key());
        let typed = self.cache.typed::<Vec<SearchResult>>(CacheClass::SearchResults);

        if let Some(results) = typed.get(&id).await {
            debug!(query = %query, hits = results.len(), "Search served from cache");
            return Ok(results);
        }

        let results = self.index.search(query, filters, limit).await?;
        typed.set(&id, &results).await;
        Ok(results)
    }

    /// Drop every memoized search so later lookups observe new writes.
    pub async fn invalidate(&self) -> ClearReport {
        let report = self.cache.clear_pattern(CacheClass::SearchResults, "*").await;
        info!(
            hot = report.hot,
            shared = report.shared,
            "Invalidated cached search results"
        );
        report
    }
}
