//! LLM provider boundary
//!
//! The conversation model shared by every crate, plus the [`Provider`]
//! trait the orchestration loop talks to and an OpenAI-compatible client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;

pub mod chat_completions;
pub mod turn;

pub use chat_completions::ChatCompletionsProvider;
pub use turn::{Role, ToolRequest, ToolResult, Turn};

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("api error: {0}")]
    Api(String),

    #[error("no api key configured")]
    NoApiKey,

    #[error("invalid response from model endpoint")]
    InvalidResponse,

    #[error("rate limited")]
    RateLimited,

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Finish reason used for synthetic replies built from transport failures
pub const FINISH_REASON_ERROR: &str = "error";

/// One model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolRequest>,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    pub fn with_tool_calls(content: Option<String>, tool_calls: Vec<ToolRequest>) -> Self {
        Self {
            content,
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: Some(message.into()),
            tool_calls: Vec::new(),
            finish_reason: FINISH_REASON_ERROR.to_string(),
            usage: Usage::default(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.finish_reason == FINISH_REASON_ERROR
    }

    /// Convert into the assistant turn appended to a conversation
    pub fn into_turn(self) -> Turn {
        Turn::assistant(self.content, self.tool_calls)
    }
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Tool declaration offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Completion request
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    /// Sent ahead of the turns; never part of the conversation itself
    pub system_prompt: Option<String>,
    pub turns: Vec<Turn>,
    pub tools: Vec<Tool>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tool_choice: ToolChoice,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: None,
            turns: Vec::new(),
            tools: Vec::new(),
            max_tokens: 4096,
            temperature: 0.2,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// Tool selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

/// A chat-completion endpoint
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
    fn default_model(&self) -> String;
    fn is_configured(&self) -> bool;
}

/// Build an object schema from `(name, json type, description, required)`
pub fn object_schema(properties: &[(&str, &str, &str, bool)]) -> Value {
    let mut props = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, kind, description, is_required) in properties {
        props.insert(
            name.to_string(),
            serde_json::json!({
                "type": kind,
                "description": description
            }),
        );
        if *is_required {
            required.push(name.to_string());
        }
    }

    serde_json::json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false
    })
}
