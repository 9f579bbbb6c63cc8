//! Tool catalog offered to the model.
//!
//! [`ToolRegistry`] is a static, ordered list of [`ToolSpec`]s built once at
//! startup and shared read-only across sessions. Server tools are executed by
//! the model backend and only ever observed; client tools are dispatched
//! locally by [`executor::ToolExecutor`].
//!
//! Parameter schemas are declarative ([`ParamSpec`] tables). The same table
//! renders the JSON Schema sent to the model and validates arguments before
//! dispatch.

pub mod executor;
pub mod limitless_query;
pub mod memory_add;
pub mod memory_search;
pub mod whoop_data_query;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{GatewayError, GatewayResult};

pub use executor::{ToolExecutor, ToolResult};

/// Where a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionSide {
    /// Executed by the model backend (search, code execution).
    Server,
    /// Executed locally by the gateway.
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
}

impl ParamType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    Integer(i64),
    String(&'static str),
}

impl ParamDefault {
    fn to_value(self) -> Value {
        match self {
            Self::Integer(n) => json!(n),
            Self::String(s) => json!(s),
        }
    }
}

/// One named argument of a tool.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
    /// Allowed values; empty means unrestricted.
    pub allowed: &'static [&'static str],
    pub default: Option<ParamDefault>,
}

impl ParamSpec {
    pub const fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamType::String,
            description,
            required: false,
            allowed: &[],
            default: None,
        }
    }

    pub const fn integer(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamType::Integer,
            description,
            required: false,
            allowed: &[],
            default: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    pub const fn default_int(mut self, value: i64) -> Self {
        self.default = Some(ParamDefault::Integer(value));
        self
    }
}

/// One invocable capability.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub side: ExecutionSide,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    pub const fn server(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            side: ExecutionSide::Server,
            params: &[],
        }
    }

    pub fn is_client(&self) -> bool {
        self.side == ExecutionSide::Client
    }

    /// Render the parameter table as a JSON Schema object.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            let mut prop = json!({
                "type": param.kind.as_str(),
                "description": param.description,
            });
            if !param.allowed.is_empty() {
                prop["enum"] = json!(param.allowed);
            }
            if let Some(default) = param.default {
                prop["default"] = default.to_value();
            }
            properties.insert(param.name.to_string(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check `args` against the parameter table and fill in defaults.
    ///
    /// Integer parameters also accept numeric strings; models send `"7"` often
    /// enough that rejecting it only costs a retry.
    pub fn validate(&self, args: &Value) -> GatewayResult<Map<String, Value>> {
        let mut obj = match args {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(GatewayError::validation(format!(
                    "arguments for {} must be a JSON object",
                    self.name
                )))
            }
        };

        for param in self.params {
            let present = obj.get(param.name).filter(|v| !v.is_null()).cloned();
            let Some(value) = present else {
                obj.remove(param.name);
                if param.required {
                    return Err(GatewayError::validation(format!(
                        "{} is required for {}",
                        param.name, self.name
                    )));
                }
                if let Some(default) = param.default {
                    obj.insert(param.name.to_string(), default.to_value());
                }
                continue;
            };

            let value = match (param.kind, value) {
                (ParamType::String, Value::String(s)) => {
                    if !param.allowed.is_empty() && !param.allowed.contains(&s.as_str()) {
                        return Err(GatewayError::validation(format!(
                            "{} must be one of [{}], got {s:?}",
                            param.name,
                            param.allowed.join(", ")
                        )));
                    }
                    Value::String(s)
                }
                (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                    Value::Number(n)
                }
                (ParamType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                    Ok(n) => json!(n),
                    Err(_) => return Err(type_mismatch(self.name, param)),
                },
                _ => return Err(type_mismatch(self.name, param)),
            };
            obj.insert(param.name.to_string(), value);
        }

        Ok(obj)
    }

    /// Validate, then deserialize into the tool's typed argument struct.
    pub fn parse_args<T: DeserializeOwned>(&self, args: &Value) -> GatewayResult<T> {
        let obj = self.validate(args)?;
        serde_json::from_value(Value::Object(obj)).map_err(|e| {
            GatewayError::validation(format!("invalid arguments for {}: {e}", self.name))
        })
    }
}

fn type_mismatch(tool: &str, param: &ParamSpec) -> GatewayError {
    GatewayError::validation(format!(
        "{} must be of type {} for {tool}",
        param.name,
        param.kind.as_str()
    ))
}

pub const WEB_SEARCH: ToolSpec = ToolSpec::server(
    "web_search",
    "Search the web for current information.",
);

pub const X_SEARCH: ToolSpec = ToolSpec::server(
    "x_search",
    "Search posts on X for real-time discussion.",
);

pub const CODE_EXECUTION: ToolSpec = ToolSpec::server(
    "code_execution",
    "Run code in a sandbox managed by the model backend.",
);

/// Names the model may use for a memory write; `store_memory` is a legacy alias.
pub const MEMORY_WRITE_TOOLS: [&str; 2] = [memory_add::NAME, "store_memory"];

pub fn is_memory_write(name: &str) -> bool {
    MEMORY_WRITE_TOOLS.contains(&name)
}

/// Ordered, immutable catalog of tools.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Server tools first, then the client tools, in a fixed order.
    pub fn standard() -> Self {
        Self::from_specs(vec![
            WEB_SEARCH,
            X_SEARCH,
            CODE_EXECUTION,
            whoop_data_query::SPEC,
            limitless_query::SPEC,
            memory_search::SPEC,
            memory_add::SPEC,
        ])
    }

    pub fn from_specs(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }

    pub fn list(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn client_tools(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().filter(|t| t.is_client())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_order_and_sides() {
        let registry = ToolRegistry::standard();
        assert_eq!(
            registry.names(),
            vec![
                "web_search",
                "x_search",
                "code_execution",
                "whoop_data_query",
                "limitless_query",
                "memory_search",
                "memory_add",
            ]
        );
        assert_eq!(registry.client_tools().count(), 4);
        assert_eq!(registry.get("web_search").unwrap().side, ExecutionSide::Server);
        assert!(registry.get("memory_add").unwrap().is_client());
        assert!(registry.get("teleport").is_none());
    }

    #[test]
    fn schema_renders_enum_default_and_required() {
        let schema = whoop_data_query::SPEC.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["data_type"]));
        assert_eq!(
            schema["properties"]["data_type"]["enum"],
            json!(["recovery", "sleep", "strain", "hrv"])
        );
        assert_eq!(schema["properties"]["days_back"]["default"], 7);
    }

    #[test]
    fn validate_fills_defaults() {
        let args = memory_search::SPEC
            .validate(&json!({"query": "coffee"}))
            .unwrap();
        assert_eq!(args["limit"], 5);
        assert!(!args.contains_key("user_id"));
    }

    #[test]
    fn validate_rejects_missing_required() {
        let err = whoop_data_query::SPEC.validate(&json!({})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: data_type is required for whoop_data_query"
        );
    }

    #[test]
    fn validate_rejects_values_outside_enum() {
        let err = whoop_data_query::SPEC
            .validate(&json!({"data_type": "steps"}))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn validate_coerces_numeric_strings() {
        let args = limitless_query::SPEC
            .validate(&json!({"query_type": "recent", "limit": "3"}))
            .unwrap();
        assert_eq!(args["limit"], 3);

        let err = limitless_query::SPEC
            .validate(&json!({"query_type": "recent", "limit": "lots"}))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn validate_treats_null_as_absent() {
        let args = memory_search::SPEC
            .validate(&json!({"query": "tea", "limit": null}))
            .unwrap();
        assert_eq!(args["limit"], 5);
    }

    #[test]
    fn validate_rejects_non_object_arguments() {
        let err = memory_add::SPEC.validate(&json!(["text"])).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn memory_write_aliases() {
        assert!(is_memory_write("memory_add"));
        assert!(is_memory_write("store_memory"));
        assert!(!is_memory_write("memory_search"));
    }
}
