//! Client-side tool dispatch.
//!
//! [`ToolExecutor::execute`] never fails: every outcome, including unknown
//! tools and store failures, becomes a [`ToolResult`] the model can read.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{limitless_query, memory_add, memory_search, whoop_data_query, ToolRegistry};
use crate::error::{GatewayError, GatewayResult};
use crate::integrations::biometrics::BiometricSource;
use crate::memory::MemoryStore;
use memory_search::RemoteMemorySearch;

/// Outcome of one client-executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool: impl Into<String>, result: Value) -> Self {
        Self {
            tool: tool.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    /// `true` only when the payload reports `"success": true`.
    pub fn is_success(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Arguments arrive either as an object or as the raw JSON string the model
/// produced. A string that is not JSON is treated as the text to remember;
/// JSON that is neither an object nor null is rejected.
pub fn normalize_arguments(arguments: &Value) -> GatewayResult<Value> {
    let parsed = match arguments {
        Value::String(raw) if raw.trim().is_empty() => return Ok(json!({})),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(json!({"text": raw})),
        },
        other => other.clone(),
    };
    match parsed {
        Value::Object(_) => Ok(parsed),
        Value::Null => Ok(json!({})),
        other => Err(GatewayError::validation(format!(
            "tool arguments must be a JSON object, got {other}"
        ))),
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    store: MemoryStore,
    biometrics: Arc<dyn BiometricSource>,
    memory_search: RemoteMemorySearch,
    default_user_id: String,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        store: MemoryStore,
        biometrics: Arc<dyn BiometricSource>,
        memory_search: RemoteMemorySearch,
        default_user_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            biometrics,
            memory_search,
            default_user_id: default_user_id.into(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run `tool_name` with `arguments`. `user_id` is the caller's identity,
    /// used when the model does not name a user itself.
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: &Value,
        user_id: Option<&str>,
    ) -> ToolResult {
        let user = user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.default_user_id);

        tracing::info!(tool = tool_name, user_id = user, "executing client tool");
        match self.dispatch(tool_name, arguments, user).await {
            Ok(payload) => ToolResult::ok(tool_name, payload),
            Err(GatewayError::UnknownTool(name)) => {
                tracing::warn!(tool = %name, "model requested unknown tool");
                ToolResult::ok(tool_name, json!({"error": format!("Unknown tool: {name}")}))
            }
            Err(e) => {
                if e.is_recoverable() {
                    tracing::warn!(tool = tool_name, error = %e, "tool execution failed");
                } else {
                    tracing::error!(tool = tool_name, error = %e, "tool execution failed unexpectedly");
                }
                ToolResult::failed(tool_name, e.to_string())
            }
        }
    }

    async fn dispatch(&self, tool_name: &str, arguments: &Value, user: &str) -> GatewayResult<Value> {
        let args = &normalize_arguments(arguments)?;
        match tool_name {
            whoop_data_query::NAME => whoop_data_query::run(self.biometrics.as_ref(), args).await,
            limitless_query::NAME => limitless_query::run(args).await,
            memory_search::NAME => memory_search::run(&self.memory_search, args, user).await,
            memory_add::NAME => memory_add::run(&self.store, args, user).await,
            name => match self.registry.get(name) {
                Some(spec) if !spec.is_client() => Ok(json!({
                    "error": format!("{name} is executed by the model backend")
                })),
                _ => Err(GatewayError::UnknownTool(name.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_parses_json_strings() {
        let args = normalize_arguments(&json!("{\"text\": \"likes tea\"}")).unwrap();
        assert_eq!(args, json!({"text": "likes tea"}));
    }

    #[test]
    fn normalize_wraps_plain_strings_as_text() {
        let args = normalize_arguments(&json!("likes tea")).unwrap();
        assert_eq!(args, json!({"text": "likes tea"}));
    }

    #[test]
    fn normalize_handles_empty_and_null() {
        assert_eq!(normalize_arguments(&json!("")).unwrap(), json!({}));
        assert_eq!(normalize_arguments(&json!("null")).unwrap(), json!({}));
        assert_eq!(normalize_arguments(&Value::Null).unwrap(), json!({}));
        assert_eq!(normalize_arguments(&json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn normalize_rejects_non_object_json() {
        for raw in [json!("42"), json!("[1]"), json!("\"quoted\""), json!(true), json!([1, 2])] {
            let err = normalize_arguments(&raw).unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)), "{raw}");
        }
    }

    #[test]
    fn success_flag_is_read_from_payload() {
        assert!(ToolResult::ok("memory_add", json!({"success": true, "id": "x"})).is_success());
        assert!(!ToolResult::ok("memory_add", json!({"error": "nope"})).is_success());
        assert!(!ToolResult::failed("memory_add", "boom").is_success());
    }
}
