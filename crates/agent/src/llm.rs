//! LLM client adapter
//!
//! Wraps a [`Provider`] so that every call yields an [`AssistantReply`]:
//! provider failures become a synthetic error reply and correlation ids
//! are guaranteed unique and non-empty.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use tabletalk_config::ToolChoicePolicy;
use tabletalk_provider::{ChatParams, Provider, Tool, ToolChoice, ToolRequest, Turn};

/// One assistant response, already normalized
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_requests: Vec<ToolRequest>,
    /// Set when the content describes a failed model call
    pub transport_failed: bool,
}

impl AssistantReply {
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            content: Some(message.into()),
            tool_requests: Vec::new(),
            transport_failed: true,
        }
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.tool_requests.is_empty()
    }
}

pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let defaults = ChatParams::default();
        Self {
            provider,
            model: model.into(),
            system_prompt: None,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for the next assistant turn
    pub async fn complete(
        &self,
        turns: &[Turn],
        tools: &[Tool],
        policy: ToolChoicePolicy,
    ) -> AssistantReply {
        self.complete_with_system(self.system_prompt.as_deref(), turns, tools, policy)
            .await
    }

    /// Same as [`complete`](Self::complete) with a system prompt chosen by the caller
    pub async fn complete_with_system(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
        tools: &[Tool],
        policy: ToolChoicePolicy,
    ) -> AssistantReply {
        let offer_tools = policy == ToolChoicePolicy::Auto && !tools.is_empty();

        let params = ChatParams {
            model: self.model.clone(),
            system_prompt: system_prompt.map(String::from),
            turns: turns.to_vec(),
            tools: if offer_tools { tools.to_vec() } else { Vec::new() },
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tool_choice: match policy {
                ToolChoicePolicy::Auto => ToolChoice::Auto,
                ToolChoicePolicy::None => ToolChoice::None,
            },
        };

        let response = match self.provider.chat(params).await {
            Ok(response) => response,
            Err(e) => {
                warn!("model call failed: {}", e);
                return AssistantReply::transport_failure(format!("Connection Error: {}", e));
            }
        };

        if response.is_error() {
            return AssistantReply::transport_failure(response.content.unwrap_or_default());
        }

        let mut tool_requests = response.tool_calls;
        if policy == ToolChoicePolicy::None && !tool_requests.is_empty() {
            debug!(
                "dropping {} tool requests, tools are disabled",
                tool_requests.len()
            );
            tool_requests.clear();
        }

        AssistantReply {
            content: response.content,
            tool_requests: ensure_unique_ids(tool_requests),
            transport_failed: false,
        }
    }

    /// Single user prompt, no tools, no conversation
    pub async fn prompt(&self, text: &str) -> AssistantReply {
        self.complete(&[Turn::user(text)], &[], ToolChoicePolicy::None)
            .await
    }
}

/// Replace empty or repeated correlation ids with fresh ones
fn ensure_unique_ids(requests: Vec<ToolRequest>) -> Vec<ToolRequest> {
    let mut seen = HashSet::new();
    requests
        .into_iter()
        .map(|mut request| {
            if request.id.trim().is_empty() || seen.contains(&request.id) {
                let fresh = format!("call_{}", Uuid::new_v4().simple());
                debug!("replacing tool call id {:?} with {}", request.id, fresh);
                request.id = fresh;
            }
            seen.insert(request.id.clone());
            request
        })
        .collect()
}
