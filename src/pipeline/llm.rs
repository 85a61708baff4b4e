//! LLM interaction: build text and vision messages and call the provider.
//!
//! [`LlmClient`] is the `generate` / `generate_with_vision` capability the
//! enrichment step consumes. It is an explicit value built from a provider
//! and the config; nothing here is process-global. Prompt wording lives in
//! [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Every attempt is bounded by `api_timeout_secs`. Failed or timed-out
//! attempts are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with the 5 s default and 3 retries
//! the waits are 5 s → 10 s → 20 s.

use crate::config::DigestConfig;
use crate::error::ArtifactError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Text returned by one successful LLM call plus its token usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Retrying, time-bounded wrapper around an [`LLMProvider`].
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &DigestConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Plain text completion.
    pub async fn generate(
        &self,
        task: &str,
        system: &str,
        prompt: &str,
    ) -> Result<LlmReply, ArtifactError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        self.chat_with_retry(task, &messages).await
    }

    /// Completion over a text prompt and one attached image.
    pub async fn generate_with_vision(
        &self,
        task: &str,
        system: &str,
        prompt: &str,
        image: ImageData,
    ) -> Result<LlmReply, ArtifactError> {
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user_with_images(prompt, vec![image]),
        ];
        self.chat_with_retry(task, &messages).await
    }

    async fn chat_with_retry(
        &self,
        task: &str,
        messages: &[ChatMessage],
    ) -> Result<LlmReply, ArtifactError> {
        let start = Instant::now();
        let mut last_err: Option<String> = None;
        let mut timed_out = false;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{task}: retry {attempt}/{} after {backoff}ms",
                    self.max_retries
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(messages, Some(&self.options));
            match timeout(Duration::from_secs(self.timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{task}: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(LlmReply {
                        text: response.content,
                        input_tokens: response.prompt_tokens as u64,
                        output_tokens: response.completion_tokens as u64,
                    });
                }
                Ok(Err(e)) => {
                    warn!("{task}: attempt {} failed: {e}", attempt + 1);
                    timed_out = false;
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    warn!(
                        "{task}: attempt {} timed out after {}s",
                        attempt + 1,
                        self.timeout_secs
                    );
                    timed_out = true;
                    last_err = Some(format!("timed out after {}s", self.timeout_secs));
                }
            }
        }

        if timed_out {
            return Err(ArtifactError::Timeout {
                task: task.to_string(),
                secs: self.timeout_secs,
            });
        }
        Err(ArtifactError::LlmFailed {
            task: task.to_string(),
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Build `CompletionOptions` from the digest config.
fn build_options(config: &DigestConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = DigestConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_ms(5000, 1), 5000);
        assert_eq!(backoff_ms(5000, 2), 10_000);
        assert_eq!(backoff_ms(5000, 3), 20_000);
        assert_eq!(backoff_ms(u64::MAX, 4), u64::MAX);
    }
}
