//! Collaborator traits consumed by the orchestration engine.
//!
//! These live in `quill-common` so that the LLM-backed implementations and
//! the pipeline can both reference them without circular dependencies.

use crate::content::{Content, QualityDimension};
use crate::topic::Topic;
use crate::Result;
use async_trait::async_trait;

/// Produces text from a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for `prompt`.
    ///
    /// Network-classified failures are reported as
    /// [`QuillError::TransientCollaborator`](crate::QuillError::TransientCollaborator)
    /// so the caller can retry them; anything else is a generation failure.
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Estimated cost per 1000 tokens.
    fn cost_per_unit(&self) -> f64;

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Estimated cost of one call, from prompt and output word counts.
    fn estimate_cost(&self, prompt: &str, output: &str) -> f64 {
        let tokens = prompt.split_whitespace().count() + output.split_whitespace().count();
        tokens as f64 / 1000.0 * self.cost_per_unit()
    }
}

/// Scores content quality and proposes improvements.
#[async_trait]
pub trait Assessor: Send + Sync {
    /// Score one quality dimension on a `[0, 10]` scale.
    async fn score(&self, dimension: QualityDimension, content: &Content) -> Result<f64>;

    /// Concrete suggestions fed back into regeneration.
    async fn suggest_improvements(&self, content: &Content) -> Result<Vec<String>>;
}

/// External collector of candidate topics (scrapers, feeds, fixed seeds).
#[async_trait]
pub trait TopicSource: Send + Sync {
    async fn collect_trending(&self) -> Result<Vec<Topic>>;

    fn name(&self) -> &str;
}

/// A fixed list of topics, e.g. seeds from configuration.
pub struct StaticTopicSource {
    name: String,
    topics: Vec<Topic>,
}

impl StaticTopicSource {
    pub fn new(name: impl Into<String>, topics: Vec<Topic>) -> Self {
        Self {
            name: name.into(),
            topics,
        }
    }
}

#[async_trait]
impl TopicSource for StaticTopicSource {
    async fn collect_trending(&self) -> Result<Vec<Topic>> {
        Ok(self.topics.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
