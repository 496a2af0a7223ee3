//! Application wiring: everything a process needs, built once from
//! configuration.

use quill_cache::CacheManager;
use quill_common::{Result, StaticTopicSource, SystemClock, Topic};
use quill_index::lock::sibling_path;
use quill_index::InMemoryIndex;
use quill_llm::{build_llm_client, LlmAssessor, LlmGenerator};
use std::sync::Arc;
use tracing::info;

use crate::config::QuillConfig;
use crate::scheduler::Scheduler;
use crate::schema::{validate_schema, warn_on_schema_issues};
use crate::sink::{ArticleSink, DirectorySink};
use crate::workflow::Workflow;

const GENERATOR_SYSTEM_PROMPT: &str = "You write clear, practical personal-finance articles.";

/// Shared handles for one process. Construct with [`AppContext::from_config`]
/// and tear down with [`AppContext::shutdown`].
pub struct AppContext {
    pub config: QuillConfig,
    pub index: Arc<InMemoryIndex>,
    pub cache: Arc<CacheManager>,
    pub workflow: Arc<Workflow>,
    pub scheduler: Arc<Scheduler>,
}

impl AppContext {
    pub async fn from_config(config: QuillConfig) -> Result<Self> {
        config.validate()?;

        let primary = build_llm_client(&config.llm.primary)?;
        let editor = build_llm_client(config.llm.editor())?;
        let assessor = build_llm_client(config.llm.assessor())?;

        let generator = Arc::new(
            LlmGenerator::new(primary, config.llm.primary.cost_per_1k_tokens)
                .with_system_prompt(GENERATOR_SYSTEM_PROMPT),
        );
        let editor = Arc::new(LlmGenerator::new(editor, config.llm.editor().cost_per_1k_tokens));
        let assessor = Arc::new(LlmAssessor::new(assessor));

        let index = Arc::new(InMemoryIndex::open(&config.index, Arc::new(SystemClock))?);
        let cache = Arc::new(CacheManager::new(config.cache.clone()));

        let seeds = config
            .seed_topics
            .iter()
            .map(|seed| seed.to_topic())
            .collect::<Result<Vec<Topic>>>()?;

        let mut builder = Workflow::builder(config.workflow.clone(), index.clone(), cache.clone())
            .with_generator(generator)
            .with_editor(editor)
            .with_assessor(assessor)
            .with_retry(config.llm.primary.retry.clone());

        if !seeds.is_empty() {
            builder = builder.with_source(Arc::new(StaticTopicSource::new("seed", seeds)));
        }

        if let Some(directory) = &config.sink.directory {
            let sink: Arc<dyn ArticleSink> = Arc::new(DirectorySink::new(directory));
            let reported = sink.schema().await?;
            warn_on_schema_issues(sink.name(), &validate_schema(&reported));
            builder = builder.with_sink(sink);
        }

        let workflow = Arc::new(builder.build()?);
        let mut scheduler = Scheduler::new(workflow.clone(), config.scheduler.schedule()?)
            .with_error_backoff(config.scheduler.error_backoff());
        if let Some(snapshot) = &config.index.snapshot_path {
            scheduler = scheduler.with_run_lock(sibling_path(snapshot, "run.lock"));
        }
        let scheduler = Arc::new(scheduler);

        info!(
            model = %config.llm.primary.model,
            seeds = config.seed_topics.len(),
            "Application context ready"
        );

        Ok(Self {
            config,
            index,
            cache,
            workflow,
            scheduler,
        })
    }

    /// Stop scheduling, cancel any in-flight run and persist the index.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.stop();
        self.index.flush().await?;
        info!("Application context shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedTopic;
    use quill_common::RawDocument;
    use quill_index::{IndexConfig, KnowledgeIndex};

    fn offline_config(dir: &std::path::Path) -> QuillConfig {
        let mut config = QuillConfig::default();
        config.llm.primary.api_url = Some("http://127.0.0.1:9".into());
        config.llm.primary.api_key = Some("test".into());
        config.index = IndexConfig {
            snapshot_path: Some(dir.join("index.json")),
        };
        config.seed_topics.push(SeedTopic {
            keywords: vec!["budget".into()],
            category: "finance".into(),
            trend_score: 4.0,
        });
        config
    }

    #[tokio::test]
    async fn builds_and_flushes_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::from_config(offline_config(dir.path()))
            .await
            .unwrap();

        ctx.index
            .index_raw(RawDocument::new("Budget basics", "Track every expense"))
            .await
            .unwrap();
        ctx.shutdown().await.unwrap();

        assert!(dir.path().join("index.json").exists());
        assert!(ctx.scheduler.cancel_signal().is_cancelled());
    }

    #[tokio::test]
    async fn run_after_shutdown_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::from_config(offline_config(dir.path()))
            .await
            .unwrap();
        ctx.shutdown().await.unwrap();

        let err = ctx.scheduler.run_now().await.unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }

    #[tokio::test]
    async fn contexts_on_one_snapshot_keep_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let scheduled = AppContext::from_config(offline_config(dir.path())).await.unwrap();
        let manual = AppContext::from_config(offline_config(dir.path())).await.unwrap();

        scheduled
            .index
            .index_raw(RawDocument::new("Budget basics", "Track every expense"))
            .await
            .unwrap();
        manual
            .index
            .index_raw(RawDocument::new("Bitcoin halving", "Supply schedule"))
            .await
            .unwrap();
        manual.shutdown().await.unwrap();
        scheduled.shutdown().await.unwrap();

        let reopened = InMemoryIndex::open(
            &IndexConfig {
                snapshot_path: Some(dir.path().join("index.json")),
            },
            Arc::new(SystemClock),
        )
        .unwrap();
        assert_eq!(reopened.stats().await.unwrap().raw_documents, 2);
    }

    #[tokio::test]
    async fn run_now_is_refused_while_another_process_runs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::from_config(offline_config(dir.path()))
            .await
            .unwrap();

        let elsewhere = quill_index::FileLock::try_acquire(dir.path().join("index.json.run.lock"))
            .unwrap()
            .expect("lock is free");
        let err = ctx.scheduler.run_now().await.unwrap_err();
        assert_eq!(err.kind(), "run_in_progress");
        drop(elsewhere);
    }

    #[tokio::test]
    async fn rejects_unknown_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.llm.primary.provider = "carrier-pigeon".into();
        let err = AppContext::from_config(config).await.err().unwrap();
        assert_eq!(err.kind(), "config");
    }
}
