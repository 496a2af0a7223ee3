//! Quill command-line interface.
//!
//! Usage:
//!   quill --config quill.toml run-now
//!   quill --config quill.toml schedule
//!   quill --config quill.toml ingest documents.json
//!   quill cache clear search_results "bitcoin*"
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` - provider keys when not set in the config
//! - `RUST_LOG` - log filter (default: `info,quill_pipeline=debug`)

use anyhow::Context;
use clap::{Parser, Subcommand};
use quill_cache::CacheClass;
use quill_common::RawDocument;
use quill_index::KnowledgeIndex;
use quill_pipeline::{AppContext, QuillConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quill")]
#[command(version)]
#[command(about = "Topic selection, content generation and quality-gated publishing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one workflow run now
    RunNow,

    /// Show index, cache and workflow statistics
    Stats,

    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Run on the configured schedule until interrupted
    Schedule,

    /// Index raw documents from a JSON array
    Ingest {
        /// File holding `[{"title": ..., "body": ..., ...}]`
        file: PathBuf,
    },

    /// Load and validate the configuration
    CheckConfig,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove entries matching a glob pattern
    Clear {
        /// Content class, e.g. `search_results`; every class when omitted
        class: Option<String>,

        /// Glob over identifiers
        #[arg(default_value = "*")]
        pattern: String,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<QuillConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            QuillConfig::from_file(path)
        }
        None => {
            tracing::info!("Using default configuration");
            Ok(QuillConfig::default())
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,quill_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Commands::CheckConfig = cli.command {
        return check_config(&config);
    }

    let ctx = AppContext::from_config(config).await?;
    let outcome = match cli.command {
        Commands::RunNow => run_now(&ctx).await,
        Commands::Stats => stats(&ctx).await,
        Commands::Cache {
            action: CacheAction::Clear { class, pattern },
        } => clear_cache(&ctx, class.as_deref(), &pattern).await,
        Commands::Schedule => schedule(&ctx).await,
        Commands::Ingest { file } => ingest(&ctx, &file).await,
        Commands::CheckConfig => Ok(()),
    };
    ctx.shutdown().await?;
    outcome
}

async fn run_now(ctx: &AppContext) -> anyhow::Result<()> {
    let result = ctx.scheduler.run_now().await?;
    print_json(&result)?;
    if let Some(error) = result.error {
        anyhow::bail!("run {} did not publish: {}", result.run_id, error.kind);
    }
    Ok(())
}

#[derive(Serialize)]
struct StatsReport {
    index: quill_index::IndexStats,
    cache: quill_cache::CacheStats,
    workflow: quill_pipeline::WorkflowStats,
    reuse_rate: f64,
}

async fn stats(ctx: &AppContext) -> anyhow::Result<()> {
    let workflow = ctx.workflow.stats();
    print_json(&StatsReport {
        index: ctx.index.stats().await?,
        cache: ctx.cache.stats().await,
        reuse_rate: workflow.reuse_rate(),
        workflow,
    })
}

async fn clear_cache(ctx: &AppContext, class: Option<&str>, pattern: &str) -> anyhow::Result<()> {
    let report = match class {
        Some(name) => {
            let class = CacheClass::parse(name).with_context(|| {
                let known: Vec<&str> = CacheClass::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown cache class '{name}', expected one of: {}", known.join(", "))
            })?;
            ctx.cache.clear_pattern(class, pattern).await
        }
        None => ctx.cache.clear_all().await,
    };
    print_json(&report)
}

async fn schedule(ctx: &AppContext) -> anyhow::Result<()> {
    let scheduler = ctx.scheduler.clone();
    let looping = tokio::spawn(async move { scheduler.run_forever().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, stopping scheduler");
    ctx.scheduler.stop();
    looping.await?;
    Ok(())
}

async fn ingest(ctx: &AppContext, file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read '{}'", file.display()))?;
    let documents: Vec<RawDocument> = serde_json::from_slice(&bytes)
        .with_context(|| format!("'{}' is not a JSON array of documents", file.display()))?;

    let total = documents.len();
    let report = ctx.index.index_raw_batch(documents).await;
    tracing::info!(total, success = report.success, failed = report.failed, "Ingest finished");
    print_json(&report)
}

fn check_config(config: &QuillConfig) -> anyhow::Result<()> {
    config.validate()?;
    let schedule = config.scheduler.schedule()?;
    println!("Configuration OK");
    println!("  primary model: {}/{}", config.llm.primary.provider, config.llm.primary.model);
    println!("  editor model:  {}/{}", config.llm.editor().provider, config.llm.editor().model);
    println!("  quality threshold: {}", config.workflow.quality_threshold);
    println!("  schedule: {schedule:?}");
    println!("  seed topics: {}", config.seed_topics.len());
    if let Some(directory) = &config.sink.directory {
        println!("  sink directory: {}", directory.display());
    }
    Ok(())
}
