//! Bounded retry with exponential backoff for transient collaborator failures.

use quill_common::{QuillError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (zero-based).
    pub fn compute_delay(&self, attempt: u32) -> u64 {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let jitter = (base * 0.1 * jitter(attempt)) as u64;
        let delay = (base as u64).saturating_add(jitter);
        delay.min(self.max_delay_ms)
    }
}

/// Deterministic jitter in `[0, 1)` derived from the attempt number.
fn jitter(attempt: u32) -> f64 {
    let x = attempt.wrapping_mul(2654435761);
    (x % 100) as f64 / 100.0
}

/// Whether an error message carries a transient network signature.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection reset")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("broken pipe")
}

/// Map a failed HTTP send into the error taxonomy.
pub fn classify_transport(provider: &str, error: &reqwest::Error) -> QuillError {
    let message = format!("{provider} request failed: {error}");
    if error.is_timeout() || error.is_connect() || is_transient_message(&error.to_string()) {
        QuillError::TransientCollaborator(message)
    } else {
        QuillError::Generation(message)
    }
}

/// Which collaborator a retried call goes to. Decides the error a call
/// escalates to once retries run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Generator,
    Assessor,
}

impl Collaborator {
    fn escalate(self, message: String) -> QuillError {
        match self {
            Self::Generator => QuillError::Generation(message),
            Self::Assessor => QuillError::Assessment(message),
        }
    }
}

/// Map a non-success provider reply into the error taxonomy.
pub fn classify_status(provider: &str, status: reqwest::StatusCode, body: &str) -> QuillError {
    let message = format!("{provider} API error {status}: {body}");
    if is_transient_message(&message) {
        QuillError::TransientCollaborator(message)
    } else {
        QuillError::Generation(message)
    }
}

/// Run `op`, retrying transient failures up to `config.max_retries` times.
///
/// Non-transient errors return immediately. A transient error that survives
/// every retry escalates to [`QuillError::Generation`] or
/// [`QuillError::Assessment`] depending on `target`.
pub async fn with_backoff<T, F, Fut>(
    config: &RetryConfig,
    target: Collaborator,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= config.max_retries => {
                return Err(target.escalate(format!(
                    "{label} failed after {} retries: {e}",
                    config.max_retries
                )));
            }
            Err(e) => {
                let delay = config.compute_delay(attempt);
                warn!(
                    call = label,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay,
                    error = %e,
                    "Retrying transient collaborator failure"
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        }
    }

    #[test]
    fn default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn transient_signatures() {
        assert!(is_transient_message("Connection reset by peer (os error 104)"));
        assert!(is_transient_message("operation timed out"));
        assert!(is_transient_message("Broken pipe"));
        assert!(!is_transient_message("API error 401 Unauthorized"));
        assert!(!is_transient_message("429 Too Many Requests"));
    }

    #[test]
    fn provider_status_classification() {
        let gateway = classify_status("OpenAI", reqwest::StatusCode::GATEWAY_TIMEOUT, "upstream timed out");
        assert!(gateway.is_transient());

        let auth = classify_status("Anthropic", reqwest::StatusCode::UNAUTHORIZED, "invalid x-api-key");
        assert_eq!(auth.kind(), "generation_failure");
        assert!(auth.to_string().contains("Anthropic API error 401"));
    }

    #[test]
    fn compute_delay_respects_max() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 500,
            max_delay_ms: 2000,
            backoff_multiplier: 10.0,
        };
        assert!(config.compute_delay(5) <= 2000);
        assert!(config.compute_delay(0) >= 500);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_backoff(&fast(), Collaborator::Generator, "generate", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(QuillError::TransientCollaborator("connection reset".into()))
            } else {
                Ok("text")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "text");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn escalates_after_cap() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_backoff(&fast(), Collaborator::Generator, "generate", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(QuillError::TransientCollaborator("broken pipe".into()))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), "generation_failure");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn assessor_outage_escalates_as_assessment() {
        let result: Result<f64> = with_backoff(&fast(), Collaborator::Assessor, "readability", || async {
            Err(QuillError::TransientCollaborator("connection reset".into()))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), "assessment_failure");
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_backoff(&fast(), Collaborator::Generator, "generate", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(QuillError::Generation("401 Unauthorized".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
