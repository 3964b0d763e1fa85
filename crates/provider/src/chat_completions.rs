//! OpenAI-compatible `/chat/completions` client
//!
//! Works against OpenAI, OpenRouter, LiteLLM proxies and local servers that
//! speak the same wire format.

use crate::*;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, trace};

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";

/// Chat-completions endpoint client
pub struct ChatCompletionsProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
    timeout: Duration,
}

impl ChatCompletionsProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self::with_timeout(api_key, api_base, default_model, Duration::from_secs(60))
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
        timeout: Duration,
    ) -> Self {
        let api_key = api_key.into();

        let api_base = api_base
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| {
                if api_key.starts_with("sk-or-") {
                    OPENROUTER_BASE.to_string()
                } else {
                    OPENAI_BASE.to_string()
                }
            })
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            api_base,
            default_model: default_model.unwrap_or_else(|| "gpt-4.1".to_string()),
            timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn turn_to_wire(turn: &Turn) -> serde_json::Value {
        match turn {
            Turn::User { content } => json!({ "role": "user", "content": content }),
            Turn::Assistant {
                content,
                tool_requests,
            } => {
                let mut obj = json!({ "role": "assistant", "content": content });
                if !tool_requests.is_empty() {
                    let calls: Vec<serde_json::Value> = tool_requests
                        .iter()
                        .map(|r| {
                            json!({
                                "id": r.id,
                                "type": "function",
                                "function": {
                                    "name": r.name,
                                    "arguments": r.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                obj
            }
            Turn::ToolResult {
                tool_call_id,
                tool_name,
                result,
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "name": tool_name,
                "content": result.to_content(),
            }),
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let mut messages = Vec::with_capacity(params.turns.len() + 1);
        if let Some(system) = &params.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(params.turns.iter().map(Self::turn_to_wire));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        // With tool choice `none` the tools are not offered at all
        if params.tool_choice == ToolChoice::Auto && !params.tools.is_empty() {
            body["tools"] = json!(params.tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn parse_arguments(raw: &serde_json::Value) -> serde_json::Value {
        match raw {
            serde_json::Value::String(s) if s.trim().is_empty() => json!({}),
            serde_json::Value::String(s) => {
                serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone()))
            }
            serde_json::Value::Null => json!({}),
            other => other.clone(),
        }
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        if !message.is_object() {
            return Err(ProviderError::InvalidResponse);
        }

        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| {
                        let function = &call["function"];
                        ToolRequest {
                            id: call["id"].as_str().unwrap_or("").to_string(),
                            name: function["name"].as_str().unwrap_or("").to_string(),
                            arguments: Self::parse_arguments(&function["arguments"]),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = json["usage"]
            .as_object()
            .map(|usage| Usage {
                prompt_tokens: usage
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                completion_tokens: usage
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                total_tokens: usage
                    .get("total_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        trace!("chat completion request to {}", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params);

        let mut request = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout.as_secs())
            } else {
                ProviderError::Request(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text));
            return Err(ProviderError::Api(message));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let response = self.parse_response(json)?;

        debug!(
            "chat completion returned {} tool call(s), finish_reason={}",
            response.tool_calls.len(),
            response.finish_reason
        );

        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty() || self.api_base != OPENAI_BASE
    }
}
