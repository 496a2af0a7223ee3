//! Generator backed by an LLM client.

use async_trait::async_trait;
use quill_common::{Generator, QuillError, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::{LlmClient, LlmRequest};

pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    name: String,
    cost_per_1k_tokens: f64,
    system_prompt: Option<String>,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>, cost_per_1k_tokens: f64) -> Self {
        Self {
            name: client.model_name().to_string(),
            client,
            cost_per_1k_tokens,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.name))]
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let mut request = LlmRequest::prompt(prompt, max_tokens, temperature);
        if let Some(system) = &self.system_prompt {
            request = request.with_system(system.clone());
        }

        let response = self.client.complete(request).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(QuillError::Generation(format!(
                "{} returned an empty completion",
                self.name
            )));
        }

        debug!(
            completion_tokens = response.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason = ?response.finish_reason,
            "Generation complete"
        );
        Ok(text.to_string())
    }

    fn cost_per_unit(&self) -> f64 {
        self.cost_per_1k_tokens
    }

    fn name(&self) -> &str {
        &self.name
    }
}
