//! Configuration for Quill.
//!
//! # File permissions
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-writable files, and world-readable files containing API keys
//! - Warns about API keys stored in config files

use chrono::NaiveTime;
use quill_cache::CacheConfig;
use quill_common::{QuillError, Result, Topic};
use quill_index::IndexConfig;
use quill_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::scheduler::Schedule;

/// Main Quill configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Topics always offered to the ranker alongside trending ones
    #[serde(default)]
    pub seed_topics: Vec<SeedTopic>,

    #[serde(default)]
    pub sink: SinkConfig,
}

/// LLM roles. `editor` and `assessor` fall back to `primary` when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    pub primary: LlmConfig,

    /// Cheaper model used for light edits of reused content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<LlmConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessor: Option<LlmConfig>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            primary: LlmConfig::new("openai", "gpt-4o-mini"),
            editor: None,
            assessor: None,
        }
    }
}

impl LlmSection {
    pub fn editor(&self) -> &LlmConfig {
        self.editor.as_ref().unwrap_or(&self.primary)
    }

    pub fn assessor(&self) -> &LlmConfig {
        self.assessor.as_ref().unwrap_or(&self.primary)
    }

    fn all(&self) -> impl Iterator<Item = &LlmConfig> {
        std::iter::once(&self.primary)
            .chain(self.editor.as_ref())
            .chain(self.assessor.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Minimum overall score for approval
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Keyword overlap at which existing content is reused
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_max_regeneration_attempts")]
    pub max_regeneration_attempts: u32,

    /// Highest-trend candidates kept for composite ranking
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,

    #[serde(default = "default_similarity_prefix_words")]
    pub similarity_prefix_words: usize,

    #[serde(default = "default_similarity_search_limit")]
    pub similarity_search_limit: usize,

    #[serde(default = "default_trending_window_days")]
    pub trending_window_days: u64,

    #[serde(default = "default_trending_limit")]
    pub trending_limit: usize,

    /// Seed for prompt variation. Unset means a fresh seed per process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_seed: Option<u64>,
}

fn default_quality_threshold() -> f64 {
    8.0
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_max_regeneration_attempts() -> u32 {
    2
}

fn default_candidate_cap() -> usize {
    5
}

fn default_similarity_prefix_words() -> usize {
    100
}

fn default_similarity_search_limit() -> usize {
    5
}

fn default_trending_window_days() -> u64 {
    7
}

fn default_trending_limit() -> usize {
    10
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            similarity_threshold: default_similarity_threshold(),
            max_regeneration_attempts: default_max_regeneration_attempts(),
            candidate_cap: default_candidate_cap(),
            similarity_prefix_words: default_similarity_prefix_words(),
            similarity_search_limit: default_similarity_search_limit(),
            trending_window_days: default_trending_window_days(),
            trending_limit: default_trending_limit(),
            variation_seed: None,
        }
    }
}

impl WorkflowConfig {
    pub fn trending_window(&self) -> Duration {
        Duration::from_secs(self.trending_window_days * 24 * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Local wall-clock time of the daily run, `HH:MM`
    #[serde(default = "default_daily_at")]
    pub daily_at: String,

    /// Run on a fixed interval instead of daily
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    /// Pause after a scheduler error
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

fn default_daily_at() -> String {
    "06:00".into()
}

fn default_error_backoff_secs() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_at: default_daily_at(),
            interval_secs: None,
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn schedule(&self) -> Result<Schedule> {
        if let Some(secs) = self.interval_secs {
            if secs == 0 {
                return Err(QuillError::Config(
                    "scheduler.interval_secs must be positive".into(),
                ));
            }
            return Ok(Schedule::Every(Duration::from_secs(secs)));
        }
        NaiveTime::parse_from_str(&self.daily_at, "%H:%M")
            .map(Schedule::Daily)
            .map_err(|e| {
                QuillError::Config(format!(
                    "scheduler.daily_at '{}' is not HH:MM: {e}",
                    self.daily_at
                ))
            })
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTopic {
    pub keywords: Vec<String>,
    #[serde(default = "default_seed_category")]
    pub category: String,
    #[serde(default = "default_seed_score")]
    pub trend_score: f64,
}

fn default_seed_category() -> String {
    "finance".into()
}

fn default_seed_score() -> f64 {
    5.0
}

impl SeedTopic {
    pub fn to_topic(&self) -> Result<Topic> {
        Topic::new(&self.keywords, self.category.as_str(), self.trend_score)
            .map(|t| t.with_context("source", serde_json::Value::from("seed")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Directory receiving one JSON document per published article
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl QuillConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix the file must be a regular file, must not be world-writable,
    /// and must not be world-readable when it holds an API key.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        if config.llm.all().any(|llm| llm.api_key.is_some()) {
            warn!(
                "API key found in config file '{}'. For better security, \
                 use environment variables instead (OPENAI_API_KEY, ANTHROPIC_API_KEY).",
                path.display()
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Range checks that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let wf = &self.workflow;
        if !(0.0..=10.0).contains(&wf.quality_threshold) {
            return Err(QuillError::Config(format!(
                "workflow.quality_threshold must be within [0, 10], got {}",
                wf.quality_threshold
            )));
        }
        if !(0.0..=1.0).contains(&wf.similarity_threshold) {
            return Err(QuillError::Config(format!(
                "workflow.similarity_threshold must be within [0, 1], got {}",
                wf.similarity_threshold
            )));
        }
        if wf.candidate_cap == 0 || wf.similarity_search_limit == 0 {
            return Err(QuillError::Config(
                "workflow.candidate_cap and workflow.similarity_search_limit must be positive"
                    .into(),
            ));
        }
        if self.cache.hot_capacity == 0 {
            return Err(QuillError::Config("cache.hot_capacity must be positive".into()));
        }
        for seed in &self.seed_topics {
            seed.to_topic()?;
        }
        self.scheduler.schedule()?;
        Ok(())
    }
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_api_key = content.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("api_key") && line.contains('=')
    });

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
