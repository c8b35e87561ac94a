//! Web search fallback.
//!
//! Only the single top organic result is used. The API key is read from the
//! environment variable named in `[search].api_key_env` at request time, so
//! a missing key degrades that request instead of failing startup.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::error::AssistError;
use crate::models::WebHit;

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// The top result for `query`, or `None` when the search found nothing.
    async fn search(&self, query: &str) -> Result<Option<WebHit>, AssistError>;
}

/// Serper-compatible client: `POST {endpoint}` with `{"q": query}`.
pub struct SerperClient {
    endpoint: String,
    api_key_env: String,
    client: Client,
}

impl SerperClient {
    pub fn new(config: &SearchConfig) -> Result<Self, AssistError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(AssistError::search)?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key_env: config.api_key_env.clone(),
            client,
        })
    }
}

#[async_trait]
impl WebSearch for SerperClient {
    async fn search(&self, query: &str) -> Result<Option<WebHit>, AssistError> {
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            AssistError::SearchUnavailable(format!("{} is not set", self.api_key_env))
        })?;

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query }))
            .send()
            .await
            .map_err(AssistError::search)?;

        if !response.status().is_success() {
            return Err(AssistError::SearchUnavailable(format!(
                "search API returned {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(AssistError::search)?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "web search completed"
        );
        Ok(parse_serper_response(&payload))
    }
}

/// Web search turned off in config; always finds nothing.
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    async fn search(&self, _query: &str) -> Result<Option<WebHit>, AssistError> {
        Ok(None)
    }
}

pub fn create_web_search(config: &SearchConfig) -> Result<Box<dyn WebSearch>, AssistError> {
    match config.provider.as_str() {
        "serper" => Ok(Box::new(SerperClient::new(config)?)),
        _ => Ok(Box::new(DisabledSearch)),
    }
}

/// First `organic` entry as a [`WebHit`]. Missing fields become empty
/// strings; an entry with neither title nor link counts as no result.
pub fn parse_serper_response(payload: &Value) -> Option<WebHit> {
    let first = payload.get("organic")?.as_array()?.first()?;
    let field = |name: &str| {
        first
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let hit = WebHit {
        title: field("title"),
        snippet: field("snippet"),
        url: field("link"),
    };
    if hit.title.is_empty() && hit.url.is_empty() {
        return None;
    }
    Some(hit)
}
