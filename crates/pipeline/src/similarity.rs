//! Reuse-versus-generate routing.

use quill_common::{Result, SearchResult, Topic};
use quill_index::SearchFilters;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::search::CachedSearch;

/// Where content for a topic comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Lightly edit existing content.
    Reuse {
        existing: SearchResult,
        similarity: f64,
    },
    /// Generate from scratch.
    Fresh,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Reuse { .. } => "reuse",
            Route::Fresh => "fresh",
        }
    }
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Fraction of the topic's keywords present in the first `prefix_words`
/// words of `body`. A multi-word keyword counts when all of its words are
/// present.
pub fn keyword_overlap(topic: &Topic, body: &str, prefix_words: usize) -> f64 {
    let keywords = topic.keywords();
    if keywords.is_empty() {
        return 0.0;
    }

    let window: HashSet<String> = body
        .split_whitespace()
        .take(prefix_words)
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();

    let present = keywords
        .iter()
        .filter(|keyword| {
            keyword
                .split_whitespace()
                .all(|part| window.contains(&normalize_word(part)))
        })
        .count();

    present as f64 / keywords.len() as f64
}

pub struct SimilarityGate {
    search: CachedSearch,
    threshold: f64,
    search_limit: usize,
    prefix_words: usize,
}

impl SimilarityGate {
    pub fn new(search: CachedSearch, threshold: f64) -> Self {
        Self {
            search,
            threshold,
            search_limit: 5,
            prefix_words: 100,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_prefix_words(mut self, words: usize) -> Self {
        self.prefix_words = words;
        self
    }

    /// Route to reuse on the first result, in relevance order, whose overlap
    /// reaches the threshold.
    #[instrument(skip(self, topic), fields(fingerprint = %topic.fingerprint()))]
    pub async fn route(&self, topic: &Topic) -> Result<Route> {
        let filters = SearchFilters::default().category(topic.category());
        let results = self
            .search
            .search(&topic.query_string(), &filters, self.search_limit)
            .await?;

        for result in results {
            let similarity = keyword_overlap(topic, &result.body, self.prefix_words);
            debug!(content_id = %result.content_id, similarity, "Compared existing content");
            if similarity >= self.threshold {
                info!(
                    content_id = %result.content_id,
                    similarity,
                    "Similar content found, reusing"
                );
                return Ok(Route::Reuse {
                    existing: result,
                    similarity,
                });
            }
        }
        Ok(Route::Fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_cache::{CacheConfig, CacheManager};
    use quill_common::RawDocument;
    use quill_index::{InMemoryIndex, KnowledgeIndex};
    use std::sync::Arc;

    fn topic(keywords: &[&str]) -> Topic {
        Topic::new(keywords.iter().copied(), "finance", 5.0).unwrap()
    }

    #[test]
    fn overlap_counts_keywords_in_prefix() {
        let t = topic(&["budget", "savings"]);
        assert_eq!(keyword_overlap(&t, "A Budget, and some savings!", 100), 1.0);
        assert_eq!(keyword_overlap(&t, "A budget only", 100), 0.5);
        assert_eq!(keyword_overlap(&t, "nothing here", 100), 0.0);
    }

    #[test]
    fn overlap_ignores_words_past_prefix() {
        let t = topic(&["budget"]);
        let body = format!("{} budget", "filler ".repeat(100));
        assert_eq!(keyword_overlap(&t, &body, 100), 0.0);
        assert_eq!(keyword_overlap(&t, &body, 101), 1.0);
    }

    #[test]
    fn multi_word_keyword_needs_every_word() {
        let t = topic(&["real estate"]);
        assert_eq!(keyword_overlap(&t, "Estate planning for real people", 100), 1.0);
        assert_eq!(keyword_overlap(&t, "Real returns", 100), 0.0);
    }

    async fn gate_with(body: &str, threshold: f64) -> SimilarityGate {
        let index = Arc::new(InMemoryIndex::new());
        index
            .index_raw(RawDocument::new("Budget and savings", body).with_category("finance"))
            .await
            .unwrap();
        let search = CachedSearch::new(index, Arc::new(CacheManager::new(CacheConfig::default())));
        SimilarityGate::new(search, threshold)
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let t = topic(&["budget", "savings", "debt", "income", "bills"]);
        // 4 of 5 keywords: exactly 0.8
        let gate = gate_with("budget savings debt income first", 0.8).await;
        match gate.route(&t).await.unwrap() {
            Route::Reuse { similarity, .. } => assert!((similarity - 0.8).abs() < 1e-12),
            Route::Fresh => panic!("expected reuse at the threshold"),
        }
    }

    #[tokio::test]
    async fn full_overlap_reuses_at_the_strictest_threshold() {
        let t = topic(&["budget", "savings"]);
        let gate = gate_with("savings grow when the budget holds", 1.0).await;
        match gate.route(&t).await.unwrap() {
            Route::Reuse { similarity, .. } => assert_eq!(similarity, 1.0),
            Route::Fresh => panic!("every keyword present should reuse"),
        }
    }

    #[tokio::test]
    async fn below_threshold_generates_fresh() {
        let t = topic(&["budget", "savings"]);
        let gate = gate_with("budget tips for students", 0.8).await;
        assert_eq!(gate.route(&t).await.unwrap(), Route::Fresh);
    }

    #[tokio::test]
    async fn empty_index_generates_fresh() {
        let search = CachedSearch::new(
            Arc::new(InMemoryIndex::new()),
            Arc::new(CacheManager::new(CacheConfig::default())),
        );
        let gate = SimilarityGate::new(search, 0.8);
        assert_eq!(gate.route(&topic(&["bitcoin"])).await.unwrap(), Route::Fresh);
    }
}
