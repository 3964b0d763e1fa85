//! Conversation turns exchanged with the model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation id assigned by the model response
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of running a tool. Always a value, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error_message: Some(message.into()),
        }
    }

    /// JSON text sent back to the model as the tool message content
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error_message": format!("tool result could not be serialized: {}", e),
            })
            .to_string()
        })
    }
}

/// One entry of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_requests: Vec<ToolRequest>,
    },
    #[serde(rename = "tool")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: ToolResult,
    },
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: Option<String>, tool_requests: Vec<ToolRequest>) -> Self {
        Turn::Assistant {
            content,
            tool_requests,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: ToolResult,
    ) -> Self {
        Turn::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            result,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
            Turn::ToolResult { .. } => Role::Tool,
        }
    }

    /// Text content, if the turn carries any
    pub fn content(&self) -> Option<&str> {
        match self {
            Turn::User { content } => Some(content),
            Turn::Assistant { content, .. } => content.as_deref(),
            Turn::ToolResult { .. } => None,
        }
    }

    /// Tool requests of an assistant turn; empty for other roles
    pub fn tool_requests(&self) -> &[ToolRequest] {
        match self {
            Turn::Assistant { tool_requests, .. } => tool_requests,
            _ => &[],
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Turn::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn tool_result_value(&self) -> Option<&ToolResult> {
        match self {
            Turn::ToolResult { result, .. } => Some(result),
            _ => None,
        }
    }
}
