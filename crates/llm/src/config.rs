//! Provider configuration and client construction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_common::{QuillError, Result};
use serde::{Deserialize, Serialize};

use crate::anthropic::AnthropicClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint) or "anthropic"
    pub provider: String,
    pub model: String,
    /// Falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Estimated cost per 1000 tokens, for run cost accounting
    #[serde(default = "default_cost_per_1k")]
    pub cost_per_1k_tokens: f64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_cost_per_1k() -> f64 {
    0.002
}

fn default_max_concurrent() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    120
}

impl LlmConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            api_url: None,
            cost_per_1k_tokens: default_cost_per_1k(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }

    /// Resolve the API key from config or environment variables.
    ///
    /// An explicit non-empty `api_key` wins; otherwise the provider's
    /// environment variable is read.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }

        let env_var = match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => return None,
        };
        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }
}

/// Caps the number of in-flight requests to the wrapped client.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| QuillError::Generation(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build a concurrency-limited client for `config`.
///
/// Transient-failure retries are applied by callers around each
/// collaborator call, not here.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let base: Arc<dyn LlmClient> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.resolve_api_key(),
            timeout,
        )?),
        "anthropic" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                QuillError::Config(
                    "Anthropic requires an API key (api_key or ANTHROPIC_API_KEY)".to_string(),
                )
            })?;
            Arc::new(AnthropicClient::new(
                config.api_url.clone(),
                config.model.clone(),
                api_key,
                timeout,
            )?)
        }
        other => {
            return Err(QuillError::Config(format!("Unknown LLM provider: {other}")));
        }
    };

    Ok(Arc::new(SemaphoredClient::new(
        base,
        config.max_concurrent_requests,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "openai"
model = "gpt-4o-mini"
api_url = "http://localhost:11434"
cost_per_1k_tokens = 0.015
max_concurrent_requests = 4

[retry]
max_retries = 5
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 3.0
"#;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert!(config.api_key.is_none());
        assert!((config.cost_per_1k_tokens - 0.015).abs() < f64::EPSILON);
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn deserialize_config_defaults() {
        let toml_str = r#"
provider = "anthropic"
model = "claude-sonnet-4-20250514"
api_key = "sk-ant-test"
"#;
        let config: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.request_timeout_secs, 120);
        assert!((config.cost_per_1k_tokens - 0.002).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn explicit_key_wins() {
        let mut config = LlmConfig::new("openai", "gpt-4o-mini");
        config.api_key = Some("sk-from-file".into());
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-from-file"));
    }

    #[test]
    fn unknown_provider_has_no_env_key() {
        let config = LlmConfig::new("gemini", "gemini-pro");
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn build_openai_client() {
        let client = build_llm_client(&LlmConfig::new("openai", "llama3")).unwrap();
        assert_eq!(client.model_name(), "llama3");
    }

    #[test]
    fn build_anthropic_client() {
        let mut config = LlmConfig::new("anthropic", "claude-sonnet-4-20250514");
        config.api_key = Some("sk-ant-test".into());
        let client = build_llm_client(&config).unwrap();
        assert_eq!(client.model_name(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let err = build_llm_client(&LlmConfig::new("gemini", "gemini-pro"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "8".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));
        let inner = Arc::new(CountingClient {
            concurrent: concurrent.clone(),
            max_seen: max_seen.clone(),
        });
        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..5 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client
                    .complete(LlmRequest::prompt("score", 10, 0.0))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
