use anyhow::{Result, anyhow};
use log::{debug, error};
use prompt_builder::Message;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Explicit backend configuration, passed in by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Request timeout in seconds; the backend call is otherwise unbounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!(
                "LLM API key is empty. Set [llm].api_key in config.toml"
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn max_retries(&self) -> usize {
        self.config.max_retries
    }

    /// One blocking backend call; retries live in [`crate::chat_with_retry`].
    pub async fn chat_once(&self, messages: &[Message]) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        debug!(
            "Sending {} messages to {} (model {})",
            messages.len(),
            url,
            self.config.model
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Backend returned {}: {}", status, body);
            return Err(anyhow!("backend returned {}: {}", status, body));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("backend response contained no choices"))?;
        Ok(content)
    }
}
