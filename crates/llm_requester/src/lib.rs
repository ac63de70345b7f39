//! LLM requester - chat-completions client for the generation backend
//!
//! Sends role-tagged message histories to an OpenAI-compatible endpoint and
//! returns the raw assistant text. Transient failures (timeouts, rate
//! limits, 5xx) are retried with exponential backoff; everything else
//! surfaces immediately.

mod chat_client;

pub use chat_client::{ChatClient, LlmConfig};

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use prompt_builder::Message;
use std::time::Duration;
use tokio::time::sleep;

/// Generation backend seam: anything that turns a message history into
/// raw assistant text. The production implementation is [`ChatClient`]
/// with retry; tests substitute scripted providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, messages: &[Message]) -> Result<String>;
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        chat_with_retry(self, messages).await
    }
}

/// Send one conversation, retrying retryable failures up to
/// `config.max_retries` times.
pub async fn chat_with_retry(client: &ChatClient, messages: &[Message]) -> Result<String> {
    let max_retries = client.max_retries().max(1);
    let mut last_error = None;

    for attempt in 1..=max_retries {
        info!("LLM request attempt {} of {}", attempt, max_retries);
        match client.chat_once(messages).await {
            Ok(response) => {
                info!(
                    "LLM request completed on attempt {}, response length: {} chars",
                    attempt,
                    response.len()
                );
                return Ok(response);
            }
            Err(e) => {
                error!("LLM request attempt {} failed: {}", attempt, e);
                let retryable = is_retryable_error(&e);
                last_error = Some(e);
                if attempt < max_retries && retryable {
                    let delay_seconds = 2_u64.pow((attempt - 1) as u32);
                    warn!(
                        "Retrying in {} seconds (attempt {} of {})",
                        delay_seconds, attempt, max_retries
                    );
                    sleep(Duration::from_secs(delay_seconds)).await;
                } else {
                    break;
                }
            }
        }
    }

    let final_error = last_error.expect("at least one attempt ran");
    Err(anyhow::anyhow!(
        "LLM request failed after {} attempts: {}",
        max_retries,
        final_error
    ))
}

/// Check if an error is retryable (network issues, timeouts, rate limits).
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    error_str.contains("timeout")
        || error_str.contains("connection")
        || error_str.contains("network")
        || error_str.contains("rate limit")
        || error_str.contains("429")
        || error_str.contains("503")
        || error_str.contains("502")
        || error_str.contains("500")
        || error_str.contains("error decoding response body")
        || error_str.contains("temporary failure")
        || error_str.contains("service unavailable")
}
