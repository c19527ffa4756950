//! Model provider boundary.
//!
//! All three supported families speak the OpenAI-compatible chat
//! completions wire format, so a single HTTP client covers them; the
//! family only decides the base URL and which environment variable holds
//! the API key.

pub mod openai;

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub use openai::OpenAiCompatibleBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
    Groq,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
        }
    }

    /// Environment variable holding this family's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    /// Chat models this family is allowed to serve.
    pub fn allowed_models(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &[
                "gpt-4.1",
                "gpt-4.1-mini",
                "gpt-4.1-nano",
                "gpt-4o",
                "gpt-4o-mini",
                "gpt-5-nano",
            ],
            Provider::Gemini => &[
                "gemini-2.5-flash",
                "gemini-2.5-flash-lite",
                "gemini-2.0-flash",
                "gemini-2.0-flash-lite",
                "gemini-1.5-flash",
                "gemini-1.5-flash-8b",
                "gemini-1.5-pro",
            ],
            Provider::Groq => &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"],
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            "groq" => Ok(Provider::Groq),
            other => Err(Error::Configuration(format!(
                "unknown provider '{other}'. Supported: openai, gemini, groq"
            ))),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which model answers a request, checked before any memory is touched.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub provider: Provider,
    pub model: String,
    pub temperature: f64,
}

impl ModelSelection {
    pub fn new(provider: Provider, model: impl Into<String>, temperature: f64) -> Self {
        ModelSelection {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.provider.allowed_models().contains(&self.model.as_str()) {
            return Err(Error::Configuration(format!(
                "model '{}' is not served by provider '{}'",
                self.model, self.provider
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::Validation(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn in the conversation sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant turn that requested tool calls, echoed back verbatim.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<Value>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// A tool observation answering one tool call.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call the model asked for.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// The provider's own JSON for this call, replayed in the follow-up turn.
    pub raw: Value,
}

/// What came back from one completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f64,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
}

/// The seam between the agent and the outside world. Production uses the
/// HTTP backend; tests script one.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionTurn>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
