//! LLM Client — unified chat interface for Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use parley_core::chat::ChatMessage;
use parley_core::config::LlmConfig;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse, LlmTier};

/// Pause before retry `n` is `n` times this.
const RETRY_BACKOFF_MS: u64 = 100;

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally (recommended).
    Ollama { base_url: String },
    /// OpenAI-compatible chat-completions API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// No LLM available — all calls return error, triggering template fallback.
    None,
}

/// The main LLM client that routes requests to the appropriate backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    small_model: String,
    large_model: String,
    max_retries: u32,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("small_model", &self.small_model)
            .field("large_model", &self.large_model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(
        provider: LlmProvider,
        small_model: impl Into<String>,
        large_model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            http: Client::new(),
            small_model: small_model.into(),
            large_model: large_model.into(),
            max_retries,
        }
    }

    /// Create a client with no LLM backend (all calls fail → template fallback).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, "", "", 0)
    }

    /// Build a client from the `[llm]` config section.
    ///
    /// # Errors
    /// Returns [`LlmError::ConfigError`] for an unknown provider, or when the
    /// OpenAI-compatible provider is selected and its API key variable is unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = match config.provider.as_str() {
            "ollama" => LlmProvider::Ollama {
                base_url: config.base_url.clone(),
            },
            "openai" => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    LlmError::ConfigError(format!("{} is not set", config.api_key_env))
                })?;
                LlmProvider::OpenAiCompatible {
                    base_url: config.base_url.clone(),
                    api_key,
                }
            }
            "none" => LlmProvider::None,
            other => {
                return Err(LlmError::ConfigError(format!("unknown provider '{other}'")));
            }
        };

        Ok(Self::new(
            provider,
            config.small_model.clone(),
            config.large_model.clone(),
            config.max_retries,
        ))
    }

    fn model_for(&self, tier: LlmTier) -> &str {
        match tier {
            LlmTier::Small => &self.small_model,
            LlmTier::Large => &self.large_model,
        }
    }

    /// Generate a response from the LLM.
    ///
    /// Returns `Err` if the LLM is unavailable or all retries fail.
    /// The caller should fall back to template generation on error.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = self.model_for(request.tier);
        let start = Instant::now();
        let mut response = match &self.provider {
            LlmProvider::None => {
                return Err(LlmError::Unavailable("No LLM provider configured".into()));
            }
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/chat");
                let body = ollama_body(model, request);
                let json = self.post_with_retries(&url, &body, None, request.timeout_ms).await?;
                LlmResponse {
                    text: json["message"]["content"].as_str().unwrap_or("").to_string(),
                    tokens_generated: json["eval_count"].as_u64().unwrap_or(0) as u32,
                    latency_ms: 0,
                    model: model.to_string(),
                }
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/chat/completions");
                let body = openai_body(model, request);
                let json = self
                    .post_with_retries(&url, &body, Some(api_key), request.timeout_ms)
                    .await?;
                LlmResponse {
                    text: json["choices"][0]["message"]["content"]
                        .as_str()
                        .unwrap_or("")
                        .to_string(),
                    tokens_generated: json["usage"]["completion_tokens"].as_u64().unwrap_or(0)
                        as u32,
                    latency_ms: 0,
                    model: model.to_string(),
                }
            }
        };
        response.latency_ms = start.elapsed().as_millis() as u64;
        Ok(response)
    }

    /// POST `body` to `url`, retrying on transport errors and non-2xx statuses.
    async fn post_with_retries(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
        timeout_ms: u64,
    ) -> Result<Value, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying LLM call (attempt {}/{})", attempt + 1, self.max_retries + 1);
                let backoff = Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt));
                tokio::time::sleep(backoff).await;
            }

            let attempt_start = Instant::now();
            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = bearer {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }

            match builder.send().await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        let json: Value = resp
                            .json()
                            .await
                            .map_err(|e| LlmError::ParseError(e.to_string()))?;
                        debug!(
                            url,
                            latency_ms = attempt_start.elapsed().as_millis() as u64,
                            "LLM call succeeded"
                        );
                        return Ok(json);
                    }
                    last_error = format!(
                        "HTTP {}: {}",
                        resp.status(),
                        resp.text().await.unwrap_or_default()
                    );
                    warn!("LLM provider returned error: {}", last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!("LLM request timed out after {}ms", timeout_ms);
                    } else {
                        warn!("LLM request failed: {}", last_error);
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Parse a raw LLM response text as structured JSON.
    ///
    /// Returns `Err` if the text is not valid JSON or doesn't match the expected type.
    pub fn parse_structured<T: serde::de::DeserializeOwned>(
        &self,
        response: &LlmResponse,
    ) -> Result<T, LlmError> {
        serde_json::from_str(response.text.trim()).map_err(|e| {
            LlmError::ParseError(format!("JSON parse error: {e} — raw text: '{}'", response.text))
        })
    }

    /// Check if the LLM client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

/// Chat messages in wire form, system prompt first.
fn wire_messages(request: &LlmRequest) -> Vec<Value> {
    let system = ChatMessage::system(request.system.as_str());
    std::iter::once(&system)
        .chain(&request.messages)
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

fn ollama_body(model: &str, request: &LlmRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": wire_messages(request),
        "stream": false,
        "options": {
            "temperature": request.temperature,
            "num_predict": request.max_tokens,
        }
    });
    if request.json_mode {
        body["format"] = json!("json");
    }
    body
}

fn openai_body(model: &str, request: &LlmRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": wire_messages(request),
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    });
    if request.json_mode {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}
