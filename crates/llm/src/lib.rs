//! LLM providers and the generator/assessor adapters built on them.

pub mod anthropic;
pub mod assessor;
pub mod client;
pub mod config;
pub mod generator;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use assessor::LlmAssessor;
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use generator::LlmGenerator;
pub use openai::OpenAiClient;
pub use retry::{
    Collaborator, RetryConfig, classify_status, classify_transport, is_transient_message,
    with_backoff,
};
