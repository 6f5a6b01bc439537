//! OpenAI-compatible chat-completions client behind the [`Generator`] seam.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GENERATION_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_GENERATION_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

/// A generation attempt that produced no answer
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationError {
    #[error("Generation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token; empty disables auth
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GENERATION_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: 0.3,
            timeout_secs: 60,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

pub struct ChatCompletionsClient {
    http: Client,
    config: GenerationConfig,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    /// Reads the API key from the configured environment variable
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = if config.api_key_env.is_empty() {
            None
        } else {
            match std::env::var(&config.api_key_env) {
                Ok(key) if !key.trim().is_empty() => Some(key),
                _ => return Err(GenerationError::MissingApiKey(config.api_key_env.clone())),
            }
        };
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: GenerationConfig,
        api_key: Option<String>,
    ) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn map_send_error(&self, err: &reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout {
                secs: self.config.timeout_secs.max(1),
            }
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Generator for ChatCompletionsClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.config.temperature,
        });

        let mut request = self.http.post(&self.config.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        log::debug!("Calling generation model {}", self.config.model);
        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(&e))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let value: Value =
            serde_json::from_str(&body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
        completion_text(&value)
    }
}

/// `choices[0].message.content`, trimmed
pub fn completion_text(response: &Value) -> Result<String, GenerationError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| GenerationError::Malformed("missing choices[0].message.content".into()))
}
