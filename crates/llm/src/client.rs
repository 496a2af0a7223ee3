//! Provider-neutral chat completion types.

use async_trait::async_trait;
use quill_common::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// A single user turn.
    pub fn prompt(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            system_prompt: None,
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt.into(),
            }],
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

/// A chat completion provider.
///
/// Network-level failures come back as
/// [`QuillError::TransientCollaborator`](quill_common::QuillError::TransientCollaborator);
/// provider rejections as [`QuillError::Generation`](quill_common::QuillError::Generation).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builds_single_user_turn() {
        let request = LlmRequest::prompt("Rate this", 10, 0.2).with_system("You are an editor.");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "Rate this");
        assert_eq!(request.max_tokens, Some(10));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.system_prompt.as_deref(), Some("You are an editor."));
    }

    #[test]
    fn usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
