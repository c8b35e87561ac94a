//! Chat-completion client (OpenAI-compatible `/chat/completions`).
//!
//! The same client serves both deployment profiles; only the base URL, model
//! and optional API key change. Responses are read non-streaming.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::LlmConfig;
use crate::error::AssistError;

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AssistError>;
}

pub struct OpenAiCompatClient {
    url: String,
    model: String,
    api_key_env: Option<String>,
    max_tokens: u32,
    temperature: Option<f32>,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AssistError> {
        let backend = config.active();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(AssistError::generation)?;
        Ok(Self {
            url: format!("{}/chat/completions", backend.base_url.trim_end_matches('/')),
            model: backend.model.clone(),
            api_key_env: backend.api_key_env.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, system: &str, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "max_tokens": self.max_tokens,
            "stream": false,
        });
        if let (Some(obj), Some(t)) = (body.as_object_mut(), self.temperature) {
            obj.insert("temperature".to_string(), json!(t));
        }
        body
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompatClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AssistError> {
        let mut request = self.client.post(&self.url).json(&self.request_body(system, prompt));
        if let Some(ref env) = self.api_key_env {
            let key = std::env::var(env)
                .map_err(|_| AssistError::GenerationFailed(format!("{} is not set", env)))?;
            request = request.bearer_auth(key);
        }

        let started = Instant::now();
        let res = request.send().await.map_err(AssistError::generation)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AssistError::GenerationFailed(format!(
                "chat completion returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(AssistError::generation)?;
        let content = parse_completion(&payload)?;
        tracing::info!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion"
        );
        Ok(content)
    }
}

/// Text of the first choice. A response without one, or with only
/// whitespace, is malformed.
pub fn parse_completion(payload: &Value) -> Result<String, AssistError> {
    let content = payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AssistError::GenerationFailed("response has no message content".to_string()))?;
    if content.is_empty() {
        return Err(AssistError::GenerationFailed("empty completion".to_string()));
    }
    Ok(content)
}
