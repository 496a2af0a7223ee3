//! In-process knowledge index.

use crate::fingerprint::{content_vector, cosine_similarity};
use crate::index::KnowledgeIndex;
use crate::lock::{sibling_path, FileLock};
use crate::terms::{extract_terms, is_domain_term, tokenize};
use crate::types::{IndexConfig, IndexStats, SearchFilters, SimilarityHit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_common::{
    ArticleId, Clock, Content, ContentClass, ContentStyle, IndexReceipt, QuillError, RawDocument,
    Result, SearchResult, SystemClock, Topic,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const TITLE_WEIGHT: f64 = 3.0;
const BODY_WEIGHT: f64 = 2.0;
const INSIGHT_WEIGHT: f64 = 2.0;
const TERM_BOOST: f64 = 1.5;

/// Category given to trending topics when no document names one.
pub const DEFAULT_TREND_CATEGORY: &str = "finance";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRecord {
    document: RawDocument,
    terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcessedRecord {
    article_id: ArticleId,
    content: Content,
    topic: Topic,
    style: ContentStyle,
    quality_score: f64,
    terms: Vec<String>,
    vector: Vec<f64>,
    indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopicRecord {
    topic: Topic,
    indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Store {
    raw: Vec<RawRecord>,
    processed: Vec<ProcessedRecord>,
    topics: BTreeMap<String, TopicRecord>,
}

impl Store {
    /// Fold `newer` in. Records sharing an id with one in `newer` are replaced.
    fn absorb(&mut self, newer: Store) {
        let raw_ids: HashSet<&str> = newer.raw.iter().map(|r| r.document.id.as_str()).collect();
        self.raw.retain(|r| !raw_ids.contains(r.document.id.as_str()));
        self.raw.extend(newer.raw);

        let article_ids: HashSet<&ArticleId> = newer.processed.iter().map(|r| &r.article_id).collect();
        self.processed.retain(|r| !article_ids.contains(&r.article_id));
        self.processed.extend(newer.processed);

        self.topics.extend(newer.topics);
    }
}

/// Fields of one document as the scorer sees them.
struct Candidate<'a> {
    title: &'a str,
    body: String,
    insights: &'a [String],
    terms: &'a [String],
}

/// Knowledge index held in memory, optionally snapshotted to a JSON file.
pub struct InMemoryIndex {
    store: RwLock<Store>,
    clock: Arc<dyn Clock>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: RwLock::new(Store::default()),
            clock,
            snapshot_path: None,
        }
    }

    /// Open the index described by `config`, loading its snapshot when one
    /// exists.
    pub fn open(config: &IndexConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut index = Self::with_clock(clock);
        if let Some(path) = &config.snapshot_path {
            if path.exists() {
                let store = load_snapshot(path)?;
                info!(
                    path = %path.display(),
                    raw = store.raw.len(),
                    processed = store.processed.len(),
                    "Loaded index snapshot"
                );
                index.store = RwLock::new(store);
            }
            index.snapshot_path = Some(path.clone());
        }
        Ok(index)
    }

    /// Merge this index into the snapshot, if one is configured, and pick up
    /// whatever other processes wrote to it since it was loaded.
    ///
    /// The merge runs under an exclusive lock on `<snapshot>.lock` and
    /// replaces the file atomically.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = self.snapshot_path.clone() else {
            return Ok(());
        };
        let mut store = self.store.write().await;
        let local = store.clone();
        let merged = tokio::task::spawn_blocking(move || merge_snapshot(&path, local))
            .await
            .map_err(|e| QuillError::IndexBackendUnavailable(format!("snapshot writer stopped: {e}")))??;
        debug!(
            raw = merged.raw.len(),
            processed = merged.processed.len(),
            "Flushed index snapshot"
        );
        *store = merged;
        Ok(())
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn load_snapshot(path: &Path) -> Result<Store> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        QuillError::IndexBackendUnavailable(format!(
            "corrupt index snapshot {}: {e}",
            path.display()
        ))
    })
}

fn merge_snapshot(path: &Path, local: Store) -> Result<Store> {
    let _lock = FileLock::acquire(sibling_path(path, "lock"))?;
    let mut store = if path.exists() {
        load_snapshot(path)?
    } else {
        Store::default()
    };
    store.absorb(local);

    let tmp = sibling_path(path, "tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&store)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(store)
}

fn relevance(query_terms: &HashSet<String>, doc: &Candidate<'_>) -> f64 {
    let title: HashSet<String> = tokenize(doc.title).into_iter().collect();
    let body: HashSet<String> = tokenize(&doc.body).into_iter().collect();
    let insights: HashSet<String> = doc.insights.iter().flat_map(|i| tokenize(i)).collect();

    query_terms
        .iter()
        .map(|term| {
            let mut score = 0.0;
            if title.contains(term) {
                score += TITLE_WEIGHT;
            }
            if body.contains(term) {
                score += BODY_WEIGHT;
            }
            if insights.contains(term) {
                score += INSIGHT_WEIGHT;
            }
            if is_domain_term(term) && doc.terms.iter().any(|t| t == term) {
                score += TERM_BOOST;
            }
            score
        })
        .sum()
}

fn within(at: DateTime<Utc>, filters: &SearchFilters) -> bool {
    filters.from.map_or(true, |from| at >= from) && filters.to.map_or(true, |to| at <= to)
}

fn raw_matches(record: &RawRecord, filters: &SearchFilters) -> bool {
    let doc = &record.document;
    filters.content_class.map_or(true, |c| c == ContentClass::Raw)
        && filters.style.is_none()
        && filters
            .category
            .as_deref()
            .map_or(true, |c| doc.category.as_deref().map(str::to_lowercase).as_deref() == Some(c))
        && filters.source_id.as_deref().map_or(true, |s| doc.source_id == s)
        && within(doc.collected_at, filters)
}

fn processed_matches(record: &ProcessedRecord, filters: &SearchFilters) -> bool {
    filters.content_class.map_or(true, |c| c == ContentClass::Processed)
        && filters.style.map_or(true, |s| s == record.style)
        && filters.category.as_deref().map_or(true, |c| record.topic.category() == c)
        && filters.source_id.is_none()
        && within(record.indexed_at, filters)
}

fn raw_result(record: &RawRecord, relevance_score: f64) -> SearchResult {
    let doc = &record.document;
    let mut source_info = serde_json::Map::new();
    source_info.insert("source_id".into(), doc.source_id.clone().into());
    source_info.insert("url".into(), doc.url.clone().into());

    let mut metadata = doc.metadata.clone();
    metadata.insert("financial_terms".into(), record.terms.clone().into());
    if let Some(category) = &doc.category {
        metadata.insert("category".into(), category.clone().into());
    }

    SearchResult {
        content_id: doc.id.clone(),
        title: doc.title.clone(),
        body: doc.body.clone(),
        relevance_score,
        content_class: ContentClass::Raw,
        created_at: doc.collected_at,
        source_info,
        metadata,
    }
}

fn processed_result(record: &ProcessedRecord, relevance_score: f64) -> SearchResult {
    let mut metadata = serde_json::Map::new();
    metadata.insert("category".into(), record.topic.category().into());
    metadata.insert(
        "topic_keywords".into(),
        record.topic.keywords().iter().cloned().collect::<Vec<_>>().into(),
    );
    metadata.insert("content_style".into(), record.style.as_str().into());
    metadata.insert("quality_score".into(), record.quality_score.into());
    metadata.insert("key_insights".into(), record.content.key_insights.clone().into());

    SearchResult {
        content_id: record.article_id.to_string(),
        title: record.content.title.clone(),
        body: record.content.main_content.clone(),
        relevance_score,
        content_class: ContentClass::Processed,
        created_at: record.indexed_at,
        source_info: serde_json::Map::new(),
        metadata,
    }
}

/// Most common value, ties broken alphabetically.
fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(value, _)| value.to_string())
}

#[async_trait]
impl KnowledgeIndex for InMemoryIndex {
    #[instrument(skip(self, filters))]
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let store = self.store.read().await;
        let mut results: Vec<SearchResult> = Vec::new();

        for record in store.raw.iter().filter(|r| raw_matches(r, filters)) {
            let candidate = Candidate {
                title: &record.document.title,
                body: record.document.body.clone(),
                insights: &[],
                terms: &record.terms,
            };
            let score = relevance(&query_terms, &candidate);
            if score > 0.0 {
                results.push(raw_result(record, score));
            }
        }

        for record in store.processed.iter().filter(|r| processed_matches(r, filters)) {
            let candidate = Candidate {
                title: &record.content.title,
                body: format!(
                    "{}\n\n{}\n\n{}",
                    record.content.introduction,
                    record.content.main_content,
                    record.content.conclusion
                ),
                insights: &record.content.key_insights,
                terms: &record.terms,
            };
            let score = relevance(&query_terms, &candidate);
            if score > 0.0 {
                results.push(processed_result(record, score));
            }
        }

        results.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        results.truncate(limit);

        debug!(query = %query, hits = results.len(), "Search complete");
        Ok(results)
    }

    async fn similarity(
        &self,
        reference: &Content,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>> {
        let reference_vector = content_vector(&reference.full_text());
        let store = self.store.read().await;

        let mut hits: Vec<SimilarityHit> = store
            .processed
            .iter()
            .filter_map(|record| {
                let score = cosine_similarity(&reference_vector, &record.vector);
                (score >= threshold).then(|| SimilarityHit {
                    content_id: record.article_id.to_string(),
                    score,
                    content: record.content.clone(),
                    topic: record.topic.clone(),
                    style: record.style,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn trending(&self, window: Duration, limit: usize) -> Result<Vec<Topic>> {
        let now = self.clock.now();
        let window = chrono::Duration::from_std(window)
            .map_err(|e| QuillError::Config(format!("trending window out of range: {e}")))?;
        let start = now - window;

        struct Tally<'a> {
            count: usize,
            first_seen: DateTime<Utc>,
            categories: Vec<&'a str>,
        }

        let store = self.store.read().await;
        let mut tallies: HashMap<&str, Tally<'_>> = HashMap::new();
        for record in store
            .raw
            .iter()
            .filter(|r| r.document.collected_at >= start && r.document.collected_at <= now)
        {
            for term in &record.terms {
                let tally = tallies.entry(term.as_str()).or_insert(Tally {
                    count: 0,
                    first_seen: record.document.collected_at,
                    categories: Vec::new(),
                });
                tally.count += 1;
                tally.first_seen = tally.first_seen.min(record.document.collected_at);
                if let Some(category) = record.document.category.as_deref() {
                    tally.categories.push(category);
                }
            }
        }

        let mut ranked: Vec<(&str, Tally<'_>)> = tallies.into_iter().collect();
        ranked.sort_by(|(term_a, a), (term_b, b)| {
            let score_a = trend_score(a.count);
            let score_b = trend_score(b.count);
            score_b
                .total_cmp(&score_a)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
                .then_with(|| term_a.cmp(term_b))
        });

        let mut topics = Vec::with_capacity(limit.min(ranked.len()));
        for (term, tally) in ranked.into_iter().take(limit) {
            let category = most_common(tally.categories.iter().copied())
                .unwrap_or_else(|| DEFAULT_TREND_CATEGORY.to_string());
            let topic = Topic::new([term], category, trend_score(tally.count))?
                .with_context("mention_count", tally.count.into())
                .with_context("first_seen", tally.first_seen.to_rfc3339().into())
                .with_context("window_secs", window.num_seconds().into());
            topics.push(topic);
        }

        debug!(topics = topics.len(), "Trending aggregation complete");
        Ok(topics)
    }

    async fn index_raw(&self, document: RawDocument) -> Result<()> {
        let terms = extract_terms(&format!("{} {}", document.title, document.body));
        let mut store = self.store.write().await;
        store.raw.retain(|r| r.document.id != document.id);
        store.raw.push(RawRecord { document, terms });
        Ok(())
    }

    #[instrument(skip(self, article_id, content, topic), fields(article_id = %article_id))]
    async fn index_processed(
        &self,
        article_id: &ArticleId,
        content: &Content,
        topic: &Topic,
        style: ContentStyle,
        quality_score: f64,
    ) -> Result<IndexReceipt> {
        let full_text = content.full_text();
        let record = ProcessedRecord {
            article_id: article_id.clone(),
            content: content.clone(),
            topic: topic.clone(),
            style,
            quality_score,
            terms: extract_terms(&full_text),
            vector: content_vector(&full_text),
            indexed_at: self.clock.now(),
        };
        let receipt = IndexReceipt::new(article_id.clone(), record.indexed_at);

        let previous = {
            let mut store = self.store.write().await;
            let previous = store
                .processed
                .iter()
                .position(|r| &r.article_id == article_id)
                .map(|i| store.processed.remove(i));
            store.processed.push(record);
            previous
        };

        // No receipt until the record is durable.
        if let Err(e) = self.flush().await {
            let mut store = self.store.write().await;
            store.processed.retain(|r| &r.article_id != article_id);
            store.processed.extend(previous);
            return Err(match e {
                e @ QuillError::IndexBackendUnavailable(_) => e,
                other => QuillError::IndexBackendUnavailable(format!(
                    "failed to persist {article_id}: {other}"
                )),
            });
        }
        Ok(receipt)
    }

    async fn index_topic(&self, topic: &Topic) -> Result<()> {
        let record = TopicRecord {
            topic: topic.clone(),
            indexed_at: self.clock.now(),
        };
        self.store
            .write()
            .await
            .topics
            .insert(topic.fingerprint(), record);
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let store = self.store.read().await;
        Ok(IndexStats {
            raw_documents: store.raw.len(),
            processed_documents: store.processed.len(),
            topics: store.topics.len(),
        })
    }
}

/// `min(10, count / 2)`
fn trend_score(count: usize) -> f64 {
    (count as f64 / 2.0).min(10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::ManualClock;

    fn doc(title: &str, body: &str) -> RawDocument {
        RawDocument::new(title, body)
    }

    #[tokio::test]
    async fn title_matches_outrank_body_matches() {
        let index = InMemoryIndex::new();
        index
            .index_raw(doc("Weekly notes", "A short piece about budget planning").with_category("finance"))
            .await
            .unwrap();
        index
            .index_raw(doc("Budget basics", "Where the money goes").with_category("finance"))
            .await
            .unwrap();
        index.index_raw(doc("Gardening", "Tomatoes")).await.unwrap();

        let results = index
            .search("budget", &SearchFilters::default(), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Budget basics");
        // title 3 + boost 1.5
        assert!((results[0].relevance_score - 4.5).abs() < 1e-9);
        // body 2 + boost 1.5
        assert!((results[1].relevance_score - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn filters_are_hard_constraints() {
        let index = InMemoryIndex::new();
        index
            .index_raw(doc("Savings plan", "savings").with_category("finance").with_source("rss", "https://a"))
            .await
            .unwrap();
        index
            .index_raw(doc("Savings abroad", "savings").with_category("travel"))
            .await
            .unwrap();

        let finance = SearchFilters::default().category("Finance");
        let results = index.search("savings", &finance, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_info["source_id"], "rss");

        let processed_only = SearchFilters::default().content_class(ContentClass::Processed);
        assert!(index.search("savings", &processed_only, 10).await.unwrap().is_empty());

        let source = SearchFilters::default().source("rss");
        assert_eq!(index.search("savings", &source, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn processed_content_is_searchable_and_similar() {
        let index = InMemoryIndex::new();
        let topic = Topic::new(["bitcoin"], "finance", 9.0).unwrap();
        let content = Content {
            title: "Why bitcoin".into(),
            main_content: "Bitcoin is scarce.".into(),
            key_insights: vec!["Scarcity drives value".into()],
            ..Default::default()
        };
        let id = ArticleId::new();
        let receipt = index
            .index_processed(&id, &content, &topic, ContentStyle::PhilosophicalMoney, 8.4)
            .await
            .unwrap();
        assert_eq!(receipt.article_id, id);

        let filters = SearchFilters::default()
            .category("finance")
            .style(ContentStyle::PhilosophicalMoney);
        let results = index.search("bitcoin", &filters, 5).await.unwrap();
        assert_eq!(results[0].content_id, id.to_string());
        assert_eq!(results[0].content_class, ContentClass::Processed);

        let hits = index.similarity(&content, 0.99, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].style, ContentStyle::PhilosophicalMoney);
        assert!((hits[0].score - 1.0).abs() < 1e-9);

        let suggestions = index
            .content_suggestions(&topic, ContentStyle::PracticalWisdom, 5)
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn trending_counts_inside_window() {
        let clock = ManualClock::new(Utc::now());
        let index = InMemoryIndex::with_clock(Arc::new(clock.clone()));
        let now = clock.now();

        for i in 0..6 {
            index
                .index_raw(
                    doc("Markets", "bitcoin rallies again")
                        .with_category("crypto")
                        .collected_at(now - chrono::Duration::hours(i)),
                )
                .await
                .unwrap();
        }
        for _ in 0..2 {
            index
                .index_raw(doc("Household", "budget tips").collected_at(now - chrono::Duration::hours(1)))
                .await
                .unwrap();
        }
        // Outside the window.
        for _ in 0..10 {
            index
                .index_raw(doc("Old", "mortgage rates").collected_at(now - chrono::Duration::days(30)))
                .await
                .unwrap();
        }

        let topics = index
            .trending(Duration::from_secs(7 * 24 * 3600), 10)
            .await
            .unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].fingerprint(), "crypto_bitcoin");
        assert_eq!(topics[0].trend_score(), 3.0);
        assert_eq!(topics[0].context()["mention_count"], 6);
        assert_eq!(topics[1].fingerprint(), "finance_budget");
        assert_eq!(topics[1].trend_score(), 1.0);
    }

    #[tokio::test]
    async fn trending_ties_break_on_first_seen() {
        let clock = ManualClock::new(Utc::now());
        let index = InMemoryIndex::with_clock(Arc::new(clock.clone()));
        let now = clock.now();

        // Both saturate at 10.
        for i in 0..25 {
            index
                .index_raw(doc("a", "savings").collected_at(now - chrono::Duration::minutes(i)))
                .await
                .unwrap();
            index
                .index_raw(doc("b", "dividend").collected_at(now - chrono::Duration::minutes(i + 30)))
                .await
                .unwrap();
        }

        let topics = index.trending(Duration::from_secs(86_400), 10).await.unwrap();
        assert_eq!(topics[0].trend_score(), 10.0);
        assert_eq!(topics[1].trend_score(), 10.0);
        assert_eq!(topics[0].keywords().iter().next().unwrap(), "dividend");
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            snapshot_path: Some(dir.path().join("index.json")),
        };

        let index = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        index.index_raw(doc("Tax season", "tax tips")).await.unwrap();
        index
            .index_topic(&Topic::new(["tax"], "finance", 5.0).unwrap())
            .await
            .unwrap();
        index.flush().await.unwrap();

        let reopened = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.raw_documents, 1);
        assert_eq!(stats.topics, 1);
        assert_eq!(stats.processed_documents, 0);
    }

    fn article(title: &str) -> Content {
        Content {
            title: title.into(),
            main_content: format!("{title} explained"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn processed_writes_survive_without_flush() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            snapshot_path: Some(dir.path().join("index.json")),
        };
        let topic = Topic::new(["bitcoin"], "finance", 9.0).unwrap();

        let index = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        index
            .index_processed(&ArticleId::new(), &article("Bitcoin"), &topic, ContentStyle::PracticalWisdom, 8.0)
            .await
            .unwrap();
        drop(index);

        let reopened = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        assert_eq!(reopened.stats().await.unwrap().processed_documents, 1);
    }

    #[tokio::test]
    async fn concurrent_handles_merge_into_one_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            snapshot_path: Some(dir.path().join("index.json")),
        };
        let topic = Topic::new(["bitcoin"], "finance", 9.0).unwrap();

        let scheduled = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        let manual = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();

        scheduled
            .index_processed(&ArticleId::new(), &article("Bitcoin"), &topic, ContentStyle::PracticalWisdom, 8.0)
            .await
            .unwrap();
        manual
            .index_processed(&ArticleId::new(), &article("Budgets"), &topic, ContentStyle::PracticalWisdom, 8.0)
            .await
            .unwrap();
        manual.index_raw(doc("Tax season", "tax tips")).await.unwrap();

        scheduled.flush().await.unwrap();
        manual.flush().await.unwrap();

        let reopened = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.processed_documents, 2);
        assert_eq!(stats.raw_documents, 1);
        // Flushing also picks up what the other handle wrote.
        assert_eq!(scheduled.stats().await.unwrap().processed_documents, 2);
    }

    #[tokio::test]
    async fn unwritable_snapshot_withholds_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = IndexConfig {
            snapshot_path: Some(blocker.join("index.json")),
        };
        let topic = Topic::new(["bitcoin"], "finance", 9.0).unwrap();

        let index = InMemoryIndex::open(&config, Arc::new(SystemClock)).unwrap();
        let err = index
            .index_processed(&ArticleId::new(), &article("Bitcoin"), &topic, ContentStyle::PracticalWisdom, 8.0)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "index_backend_unavailable");
        assert_eq!(index.stats().await.unwrap().processed_documents, 0);
    }
}
