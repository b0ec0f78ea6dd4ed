use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use leadflow_core::config::{LlmConfig, LlmProvider};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::warn;

/// Opaque text-in/text-out seam to the language model. The stage machine
/// never inspects the reply; it only passes it through to the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// HTTP client for OpenAI-compatible chat completion APIs (OpenAI, Ollama)
/// and the Anthropic messages API, selected by config.
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("could not build llm http client")?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        if let Some(base_url) = self.config.base_url.as_deref() {
            return base_url.trim_end_matches('/');
        }
        match self.config.provider {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Anthropic => "https://api.anthropic.com",
            LlmProvider::Ollama => "http://localhost:11434",
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        match self.config.provider {
            LlmProvider::OpenAi | LlmProvider::Ollama => self.chat_completion(prompt).await,
            LlmProvider::Anthropic => self.anthropic_message(prompt).await,
        }
    }

    async fn chat_completion(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url());
        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.1,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("chat completion returned status {status}"));
        }

        let payload: Value =
            response.json().await.context("chat completion response was not json")?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("chat completion response had no message content"))
    }

    async fn anthropic_message(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url());
        let body = json!({
            "model": self.config.model,
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": prompt}],
        });

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("anthropic provider requires an api key"))?;

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("anthropic message request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("anthropic message returned status {status}"));
        }

        let payload: Value =
            response.json().await.context("anthropic message response was not json")?;
        payload["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("anthropic message response had no text content"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.complete_once(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(error) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.complete.retry",
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %error,
                        "llm completion failed, retrying"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
}
