//! HTTP backend for OpenAI-compatible chat completion and embedding APIs.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::MemoriaConfig;
use crate::error::{Error, Result};
use crate::provider::{
    CompletionBackend, CompletionRequest, CompletionTurn, Provider, ToolCallRequest,
};

pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    chat_base_url: String,
    chat_api_key: String,
    embed_base_url: String,
    embed_api_key: String,
    embed_model: String,
    max_retries: u32,
}

impl OpenAiCompatibleBackend {
    /// Build a backend for one provider family. Fails fast when the API key
    /// environment variable is missing.
    pub fn from_config(config: &MemoriaConfig, provider: Provider) -> Result<Self> {
        let chat_api_key = require_key(provider.api_key_var())?;
        // Embeddings always go through the OpenAI endpoint, whichever
        // family serves the chat model.
        let embed_api_key = if provider == Provider::OpenAi {
            chat_api_key.clone()
        } else {
            require_key(Provider::OpenAi.api_key_var())?
        };

        let chat_base_url = match provider {
            Provider::OpenAi => &config.providers.openai_base_url,
            Provider::Gemini => &config.providers.gemini_base_url,
            Provider::Groq => &config.providers.groq_base_url,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.agent.request_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(OpenAiCompatibleBackend {
            client,
            chat_base_url: chat_base_url.trim_end_matches('/').to_string(),
            chat_api_key,
            embed_base_url: config.embedding.base_url.trim_end_matches('/').to_string(),
            embed_api_key,
            embed_model: config.embedding.model.clone(),
            max_retries: config.agent.max_retries,
        })
    }

    /// POST with bounded retries on timeouts, 429, and 5xx.
    async fn post_json(&self, url: &str, api_key: &str, payload: &Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(url)
                .bearer_auth(api_key)
                .json(payload)
                .send()
                .await;

            let retryable = match &response {
                Ok(r) => {
                    let status = r.status();
                    status.as_u16() == 429 || status.is_server_error()
                }
                Err(e) => e.is_timeout() || e.is_connect(),
            };
            if retryable && attempt <= self.max_retries {
                tracing::warn!(url, attempt, "provider request failed, retrying");
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                continue;
            }

            let response = response.map_err(|e| {
                Error::Transient(format!("provider request to {url} failed: {e}"))
            })?;
            let status = response.status();
            let body: Value = response.json().await.map_err(|e| {
                Error::Transient(format!("provider returned unreadable body: {e}"))
            })?;

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::Configuration(format!(
                    "provider rejected credentials ({status})"
                )));
            }
            if !status.is_success() {
                tracing::error!(url, %status, %body, "provider request failed");
                return if status.as_u16() == 429 || status.is_server_error() {
                    Err(Error::Transient(format!("provider error ({status})")))
                } else {
                    Err(Error::Processing)
                };
            }
            return Ok(body);
        }
    }
}

fn require_key(var: &'static str) -> Result<String> {
    std::env::var(var)
        .map_err(|_| Error::Configuration(format!("environment variable {var} is not set")))
}

/// Tool call arguments arrive as a JSON-encoded string. An empty string
/// means no arguments; anything unparseable is passed through so the
/// dispatcher can report it back to the model.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_completion(body: &Value) -> Result<CompletionTurn> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| Error::Transient("completion response had no choices".into()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
            let name = call
                .pointer("/function/name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let arguments = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .map(parse_arguments)
                .unwrap_or_else(|| json!({}));
            tool_calls.push(ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
                raw: call.clone(),
            });
        }
    }

    Ok(CompletionTurn { content, tool_calls })
}

#[async_trait]
impl CompletionBackend for OpenAiCompatibleBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionTurn> {
        let mut payload = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            payload["tools"] = Value::Array(request.tools);
        }

        let url = format!("{}/chat/completions", self.chat_base_url);
        let body = self.post_json(&url, &self.chat_api_key, &payload).await?;
        parse_completion(&body)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "model": self.embed_model,
            "input": text,
        });
        let url = format!("{}/embeddings", self.embed_base_url);
        let body = self.post_json(&url, &self.embed_api_key, &payload).await?;

        let values = body
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Transient("embedding response had no vector".into()))?;
        let embedding = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| Error::Transient("embedding vector was not numeric".into()))?;
        Ok(embedding)
    }
}
