//! OpenAI-compatible HTTP adapters.
//!
//! - [`OpenAiChat`] implements [`LanguageModel`] over `POST {base_url}/chat/completions`.
//! - [`OpenAiEmbedder`] implements [`Embedder`] over `POST {base_url}/embeddings`.
//!
//! Both read the key from `OPENAI_API_KEY` and share one retry policy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! `base_url` is configurable, so any server speaking the same wire format
//! (a proxy, a local gateway) works too.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use socratic_rag_core::{Embedder, LanguageModel, Prompt};

use crate::config::{EmbeddingConfig, LlmConfig};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

fn api_key_from_env() -> Result<String> {
    std::env::var(API_KEY_ENV)
        .map_err(|_| anyhow!("{} environment variable not set", API_KEY_ENV))
}

/// Connection details shared by both adapters.
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl Endpoint {
    fn new(
        base_url: &str,
        path: &str,
        api_key: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), path),
            api_key,
            max_retries,
        })
    }

    /// POST `body` and return the parsed JSON response, retrying transient failures.
    async fn post_json(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(attempt, delay_secs = delay.as_secs(), url = %self.url, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .with_context(|| format!("Invalid JSON from {}", self.url));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if is_retryable(status) {
                        warn!(%status, attempt, "transient API error");
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "request failed");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry `attempt` (1-based): 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

// ============ Chat ============

/// Chat-completion model.
pub struct OpenAiChat {
    endpoint: Endpoint,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    /// Build from config, reading the key from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::with_api_key(config, api_key_from_env()?)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(
                &config.base_url,
                "chat/completions",
                api_key,
                config.timeout(),
                config.max_retries,
            )?,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt.user }));

        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let json = self.endpoint.post_json(&self.request_body(prompt)).await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

// ============ Embeddings ============

/// Embedding model. Each `embed_texts` call is one request; callers batch.
pub struct OpenAiEmbedder {
    endpoint: Endpoint,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_api_key(config, api_key_from_env()?)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(
                &config.base_url,
                "embeddings",
                api_key,
                config.timeout(),
                config.max_retries,
            )?,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.endpoint.post_json(&body).await?;
        let vectors = parse_embedding_response(&json)?;
        if vectors.len() != texts.len() {
            bail!(
                "Embedding response has {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid embedding response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid embedding response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chat_response() {
        let body = json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Paris" } }]
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "Paris");
    }

    #[test]
    fn test_parse_chat_response_missing_content() {
        assert!(parse_chat_response(&json!({ "choices": [] })).is_err());
        assert!(parse_chat_response(&json!({ "error": "nope" })).is_err());
    }

    #[test]
    fn test_parse_embedding_response_orders_by_index() {
        let body = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_embedding_response(&body).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_embedding_response_missing_data() {
        assert!(parse_embedding_response(&json!({})).is_err());
        assert!(parse_embedding_response(&json!({ "data": [{ "index": 0 }] })).is_err());
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(20), Duration::from_secs(32));
    }

    #[test]
    fn test_chat_request_body() {
        let chat = OpenAiChat::with_api_key(&LlmConfig::default(), "sk-test".to_string()).unwrap();
        let body = chat.request_body(&Prompt::user("hi").with_system("be brief"));
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");

        let body = chat.request_body(&Prompt::user("hi"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        let config = LlmConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let chat = OpenAiChat::with_api_key(&config, "k".to_string()).unwrap();
        assert_eq!(chat.endpoint.url, "http://localhost:8080/v1/chat/completions");
    }
}
