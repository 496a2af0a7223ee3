//! One workflow run: select a topic, produce content, gate its quality and
//! publish it.
//!
//! ```text
//!   trending + sources ─► TopicRanker ─► SimilarityGate ─┬─ reuse ─► edit ──┐
//!                                                        └─ fresh ─► generate
//!                                                                           │
//!   sink ◄─ cache ◄─ publish ◄─ index_processed ◄─ approved ◄─ QualityGate ◄┘
//! ```

use parking_lot::Mutex;
use quill_cache::{CacheClass, CacheManager};
use quill_common::{
    Article, ArticleStatus, Assessor, CancelSignal, ContentClass, ContentStyle, Generator,
    QuillError, Result, Topic, TopicSource,
};
use quill_index::{KnowledgeIndex, SearchFilters};
use quill_llm::RetryConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::compose::{truncate_chars, ContentComposer, Origin};
use crate::config::WorkflowConfig;
use crate::metrics::{RunMetrics, WorkflowStats};
use crate::quality::{QualityGate, Verdict};
use crate::ranker::TopicRanker;
use crate::schema::article_properties;
use crate::search::CachedSearch;
use crate::similarity::{Route, SimilarityGate};
use crate::sink::ArticleSink;
use crate::variation::{SeededVariation, VariationStrategy};

const CONTEXT_SEARCH_LIMIT: usize = 5;
const CONTEXT_DOCUMENTS: usize = 3;
const CONTEXT_CHARS: usize = 300;

/// Why a run did not publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
}

impl RunError {
    fn from_error(e: &QuillError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// Outcome of one run. Failures are reported here rather than returned as
/// errors.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub metrics: RunMetrics,
}

impl WorkflowResult {
    pub fn status(&self) -> Option<ArticleStatus> {
        self.article.as_ref().map(|a| a.status)
    }
}

#[derive(Default)]
struct RunState {
    metrics: RunMetrics,
    article: Option<Article>,
    origin: Option<Origin>,
}

pub struct WorkflowBuilder {
    config: WorkflowConfig,
    index: Arc<dyn KnowledgeIndex>,
    cache: Arc<CacheManager>,
    generator: Option<Arc<dyn Generator>>,
    editor: Option<Arc<dyn Generator>>,
    assessor: Option<Arc<dyn Assessor>>,
    sources: Vec<Arc<dyn TopicSource>>,
    sink: Option<Arc<dyn ArticleSink>>,
    variation: Option<Arc<dyn VariationStrategy>>,
    retry: RetryConfig,
}

impl WorkflowBuilder {
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Generator for light edits of reused content. Defaults to the main
    /// generator.
    pub fn with_editor(mut self, editor: Arc<dyn Generator>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn with_assessor(mut self, assessor: Arc<dyn Assessor>) -> Self {
        self.assessor = Some(assessor);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn TopicSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ArticleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_variation(mut self, variation: Arc<dyn VariationStrategy>) -> Self {
        self.variation = Some(variation);
        self
    }

    /// Backoff for transient collaborator failures.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<Workflow> {
        let generator = self
            .generator
            .ok_or_else(|| QuillError::Config("workflow requires a generator".into()))?;
        let assessor = self
            .assessor
            .ok_or_else(|| QuillError::Config("workflow requires an assessor".into()))?;
        let editor = self.editor.unwrap_or_else(|| generator.clone());
        let variation = self.variation.unwrap_or_else(|| {
            let seeded = match self.config.variation_seed {
                Some(seed) => SeededVariation::new(seed),
                None => SeededVariation::from_entropy(),
            };
            Arc::new(seeded) as Arc<dyn VariationStrategy>
        });

        let config = self.config;
        let search = CachedSearch::new(self.index, self.cache.clone());
        let ranker = TopicRanker::new(search.clone(), config.candidate_cap);
        let gate = SimilarityGate::new(search.clone(), config.similarity_threshold)
            .with_search_limit(config.similarity_search_limit)
            .with_prefix_words(config.similarity_prefix_words);
        let composer = ContentComposer::new(
            generator.clone(),
            editor,
            self.cache.clone(),
            variation,
            self.retry.clone(),
        );
        let quality = QualityGate::new(
            assessor,
            generator,
            config.quality_threshold,
            config.max_regeneration_attempts,
        )
        .with_retry(self.retry);

        Ok(Workflow {
            config,
            search,
            cache: self.cache,
            ranker,
            gate,
            composer,
            quality,
            sources: self.sources,
            sink: self.sink,
            stats: Mutex::new(WorkflowStats::default()),
        })
    }
}

/// The orchestration engine. Runs are independent; statistics accumulate
/// across them.
pub struct Workflow {
    config: WorkflowConfig,
    search: CachedSearch,
    cache: Arc<CacheManager>,
    ranker: TopicRanker,
    gate: SimilarityGate,
    composer: ContentComposer,
    quality: QualityGate,
    sources: Vec<Arc<dyn TopicSource>>,
    sink: Option<Arc<dyn ArticleSink>>,
    stats: Mutex<WorkflowStats>,
}

impl Workflow {
    pub fn builder(
        config: WorkflowConfig,
        index: Arc<dyn KnowledgeIndex>,
        cache: Arc<CacheManager>,
    ) -> WorkflowBuilder {
        WorkflowBuilder {
            config,
            index,
            cache,
            generator: None,
            editor: None,
            assessor: None,
            sources: Vec::new(),
            sink: None,
            variation: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn KnowledgeIndex> {
        self.search.index()
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn sink(&self) -> Option<&Arc<dyn ArticleSink>> {
        self.sink.as_ref()
    }

    pub fn stats(&self) -> WorkflowStats {
        self.stats.lock().clone()
    }

    /// Execute one run. Never fails: problems are reported in the result.
    pub async fn run(&self, cancel: &CancelSignal) -> WorkflowResult {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut state = RunState::default();
        state.metrics.run_id = run_id.clone();

        let outcome = self
            .execute(cancel, &mut state)
            .instrument(info_span!("workflow_run", run_id = %run_id))
            .await;
        state.metrics.duration_ms = started.elapsed().as_millis() as u64;

        self.finish(run_id, outcome, state)
    }

    async fn execute(&self, cancel: &CancelSignal, state: &mut RunState) -> Result<Verdict> {
        info!("Starting content workflow run");

        let mut candidates = self.trending_topics(&mut state.metrics).await?;
        cancel.check()?;

        for source in &self.sources {
            match source.collect_trending().await {
                Ok(topics) => candidates.extend(topics),
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Topic source failed");
                    state.metrics.non_fatal_failures += 1;
                }
            }
            cancel.check()?;
        }
        state.metrics.topics_considered = candidates.len();

        let ranked = self.ranker.select(candidates).await?;
        cancel.check()?;
        state.metrics.selected_topic = Some(ranked.topic.fingerprint());
        state.metrics.composite_score = Some(ranked.composite);
        let topic = ranked.topic;

        if let Err(e) = self.search.index().index_topic(&topic).await {
            warn!(error = %e, "Failed to index selected topic");
            state.metrics.non_fatal_failures += 1;
        }
        cancel.check()?;

        let style = ContentStyle::for_keywords(topic.keywords());
        let route = self.gate.route(&topic).await?;
        cancel.check()?;
        state.metrics.route = Some(route.as_str().to_string());

        let composition = match &route {
            Route::Reuse {
                existing,
                similarity,
            } => {
                state.metrics.similarity = Some(*similarity);
                self.composer.reuse(existing, &topic, cancel).await?
            }
            Route::Fresh => {
                let context = self.source_context(&topic).await?;
                cancel.check()?;
                self.composer.fresh(&topic, style, &context, cancel).await?
            }
        };
        state.metrics.generation_calls += composition.generation_calls;
        state.metrics.estimated_cost += composition.cost;
        if composition.origin == Origin::Cached {
            state.metrics.cache_hits += 1;
        }
        state.origin = Some(composition.origin);

        let article = state
            .article
            .insert(Article::generated(topic, style, composition.content));
        let verdict = self
            .quality
            .refine(article, &mut state.metrics, cancel)
            .await?;

        if verdict == Verdict::Approved {
            self.publish(article, &mut state.metrics).await?;
        }
        Ok(verdict)
    }

    /// Trending topics for the configured window, memoized in the
    /// trending-topics cache class.
    async fn trending_topics(&self, metrics: &mut RunMetrics) -> Result<Vec<Topic>> {
        let snapshots = self.cache.typed::<Vec<Topic>>(CacheClass::TrendingTopics);
        let id = format!(
            "window:{}:{}",
            self.config.trending_window_days, self.config.trending_limit
        );

        if let Some(topics) = snapshots.get(&id).await {
            metrics.cache_hits += 1;
            return Ok(topics);
        }

        let topics = self
            .search
            .index()
            .trending(self.config.trending_window(), self.config.trending_limit)
            .await?;
        snapshots.set(&id, &topics).await;
        info!(count = topics.len(), "Trending topics aggregated");
        Ok(topics)
    }

    /// Excerpts of recent raw documents about `topic` for generation prompts.
    async fn source_context(&self, topic: &Topic) -> Result<String> {
        let filters = SearchFilters::default().content_class(ContentClass::Raw);
        let results = self
            .search
            .search(&topic.query_string(), &filters, CONTEXT_SEARCH_LIMIT)
            .await?;
        Ok(results
            .iter()
            .take(CONTEXT_DOCUMENTS)
            .map(|r| format!("{}: {}", r.title, truncate_chars(&r.body, CONTEXT_CHARS)))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Write the approved article through the index, then publish, cache and
    /// hand it to the sink. Only the index write can fail the run.
    async fn publish(&self, article: &mut Article, metrics: &mut RunMetrics) -> Result<()> {
        let content = article.content.clone().unwrap_or_default();
        let score = article.overall_score().unwrap_or_default();
        let receipt = self
            .search
            .index()
            .index_processed(&article.id, &content, &article.topic, article.style, score)
            .await?;

        self.search.invalidate().await;
        article.publish(&receipt)?;

        self.cache
            .typed::<Article>(CacheClass::Article)
            .set(article.id.as_str(), article)
            .await;

        if let Some(sink) = &self.sink {
            match sink.publish(article, article_properties(article)).await {
                Ok(location) => info!(sink = sink.name(), location = %location, "Article delivered"),
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "Failed to deliver article to sink");
                    metrics.non_fatal_failures += 1;
                }
            }
        }

        info!(
            article_id = %article.id,
            quality_score = score,
            "Article published"
        );
        Ok(())
    }

    fn finish(
        &self,
        run_id: String,
        outcome: Result<Verdict>,
        mut state: RunState,
    ) -> WorkflowResult {
        let (verdict, error) = match outcome {
            Ok(Verdict::Approved) => (Some(Verdict::Approved), None),
            Ok(Verdict::BelowThreshold) => (
                Some(Verdict::BelowThreshold),
                Some(RunError {
                    kind: Verdict::BelowThreshold.kind().to_string(),
                    message: format!(
                        "quality score {:.2} below threshold {:.2}",
                        state.metrics.final_score.unwrap_or_default(),
                        self.quality.threshold()
                    ),
                }),
            ),
            Err(e) => {
                if let Some(article) = state.article.as_mut() {
                    match e {
                        QuillError::Cancelled => article.cancel(),
                        _ => article.fail(),
                    }
                }
                (None, Some(RunError::from_error(&e)))
            }
        };
        let success = error.is_none();

        {
            let mut stats = self.stats.lock();
            stats.runs += 1;
            stats.total_cost += state.metrics.estimated_cost;
            match state.article.as_ref().map(|a| a.status) {
                Some(ArticleStatus::Published) => stats.published += 1,
                Some(ArticleStatus::Rejected) => stats.rejected += 1,
                Some(ArticleStatus::Cancelled) => stats.cancelled += 1,
                _ if matches!(&error, Some(e) if e.kind == "cancelled") => stats.cancelled += 1,
                _ => stats.failed += 1,
            }
            match state.origin {
                Some(Origin::Generated) => stats.generated += 1,
                Some(_) => stats.reused += 1,
                None => {}
            }
        }

        match &error {
            None => info!(
                run_id = %run_id,
                duration_ms = state.metrics.duration_ms,
                estimated_cost = state.metrics.estimated_cost,
                "Workflow run completed"
            ),
            Some(e) => error!(
                run_id = %run_id,
                kind = %e.kind,
                error = %e.message,
                duration_ms = state.metrics.duration_ms,
                "Workflow run failed"
            ),
        }

        WorkflowResult {
            success,
            run_id,
            article: state.article,
            verdict,
            error,
            metrics: state.metrics,
        }
    }
}
