//! Tool execution boundary
//!
//! Every request produces a tool result turn. Unknown tools, bad
//! arguments, handler errors, timeouts and panics all come back as
//! failed [`ToolResult`]s the model can read and react to.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use tabletalk_provider::{ToolRequest, ToolResult, Turn};

use crate::tools::ToolRegistry;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Run one request and wrap the outcome as a tool result turn
    pub async fn execute(&self, request: &ToolRequest) -> Turn {
        let result = self.run(request).await;
        if let Some(message) = &result.error_message {
            warn!("tool {} ({}) failed: {}", request.name, request.id, message);
        } else {
            debug!("tool {} ({}) succeeded", request.name, request.id);
        }
        Turn::tool_result(request.id.clone(), request.name.clone(), result)
    }

    async fn run(&self, request: &ToolRequest) -> ToolResult {
        let Some(tool) = self.registry.get(&request.name) else {
            return ToolResult::failure(format!("unknown tool {}", request.name));
        };

        let args = match &request.arguments {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };

        if let Err(message) = validate_arguments(&tool.parameters(), &args) {
            return ToolResult::failure(format!(
                "invalid arguments for {}: {}",
                request.name, message
            ));
        }

        let mut handle = tokio::spawn(async move { tool.execute(args).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(payload))) => ToolResult::success(payload),
            Ok(Ok(Err(e))) => ToolResult::failure(e.to_string()),
            Ok(Err(join_err)) if join_err.is_panic() => {
                ToolResult::failure(format!("tool {} panicked", request.name))
            }
            Ok(Err(_)) => ToolResult::failure(format!("tool {} was cancelled", request.name)),
            Err(_) => {
                handle.abort();
                ToolResult::failure(format!(
                    "tool {} timed out after {}s",
                    request.name,
                    self.timeout.as_secs_f64()
                ))
            }
        }
    }
}

/// Check `args` against the object schema subset tools declare:
/// `type`, `properties[*].type`, `required` and `additionalProperties`.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err(match args {
            Value::String(raw) => format!("arguments are not a JSON object: {}", raw),
            other => format!("arguments must be an object, got {}", json_type(other)),
        });
    };

    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if object.get(name).map_or(true, Value::is_null) {
                return Err(format!("missing required argument '{}'", name));
            }
        }
    }

    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in object {
        match properties.and_then(|p| p.get(key)) {
            Some(property) => {
                if let Some(expected) = property.get("type") {
                    if !type_matches(expected, value) {
                        return Err(format!(
                            "argument '{}' must be {}, got {}",
                            key,
                            describe_type(expected),
                            json_type(value)
                        ));
                    }
                }
            }
            None if closed => return Err(format!("unexpected argument '{}'", key)),
            None => {}
        }
    }

    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(kind) => matches_kind(kind, value),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .any(|kind| matches_kind(kind, value)),
        _ => true,
    }
}

fn matches_kind(kind: &str, value: &Value) -> bool {
    match kind {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(kind) => kind.clone(),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
