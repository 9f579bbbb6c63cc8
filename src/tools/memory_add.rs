//! `memory_add`: persist a durable user fact through the memory store.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ExecutionSide, ParamSpec, ToolSpec};
use crate::error::{GatewayError, GatewayResult};
use crate::memory::{MemoryKind, MemoryMetadata, MemoryStore};

pub const NAME: &str = "memory_add";

const PARAMS: &[ParamSpec] = &[
    ParamSpec::string("text", "What to store as memory").required(),
    ParamSpec::string("user_id", "User identifier (optional)"),
    ParamSpec::string("type", "Memory type (optional)")
        .one_of(&["fact", "preference", "anchor", "todo", "profile"]),
    ParamSpec::string("category", "Category for anchors/preferences (optional)"),
    ParamSpec::string("date", "YYYY-MM-DD for dated memories like anchors (optional)"),
];

pub const SPEC: ToolSpec = ToolSpec {
    name: NAME,
    description: "Persist an important user memory for later use.
Call this ONLY for durable facts that are likely useful in future conversations, such as:
- Stable preferences (e.g., coffee order, preferred tools),
- Long-term projects/goals/tasks and deadlines,
- Biographical details and relationships explicitly shared,
- Anchors/commitments (category + date),
Do NOT store secrets (passwords, API keys), financial identifiers, or ephemeral one-off facts.
If the user explicitly says \"remember ...\", you may store without further confirmation.
Otherwise use discretion and store at most a few high-value items per session.",
    side: ExecutionSide::Client,
    params: PARAMS,
};

#[derive(Debug, Deserialize)]
pub struct MemoryAddArgs {
    pub text: String,
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MemoryKind>,
    pub category: Option<String>,
    pub date: Option<String>,
}

impl MemoryAddArgs {
    fn metadata(&self) -> GatewayResult<Option<MemoryMetadata>> {
        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                GatewayError::validation(format!("date must be YYYY-MM-DD, got {raw:?}"))
            })?),
            None => None,
        };
        let meta = MemoryMetadata {
            kind: self.kind,
            category: self.category.clone().filter(|c| !c.trim().is_empty()),
            date,
        };
        Ok((!meta.is_empty()).then_some(meta))
    }
}

/// Returns `{success, id}` plus `dedup: true` when the memory already existed.
pub async fn run(store: &MemoryStore, args: &Value, fallback_user: &str) -> GatewayResult<Value> {
    let args: MemoryAddArgs = SPEC.parse_args(args)?;
    let text = args.text.trim();
    if text.is_empty() {
        return Err(GatewayError::validation("text is required for memory_add"));
    }
    let user_id = args
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(fallback_user)
        .to_string();
    let metadata = args.metadata()?;

    let outcome = store.add(&user_id, text, metadata).await?;
    let mut payload = json!({"success": true, "id": outcome.id});
    if outcome.deduped {
        payload["dedup"] = json!(true);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> MemoryAddArgs {
        SPEC.parse_args(&value).unwrap()
    }

    #[test]
    fn metadata_keeps_only_present_fields() {
        let meta = args(json!({"text": "x", "type": "anchor", "category": "fitness", "date": "2025-06-01"}))
            .metadata()
            .unwrap()
            .unwrap();
        assert_eq!(meta.kind, Some(MemoryKind::Anchor));
        assert_eq!(meta.category.as_deref(), Some("fitness"));
        assert_eq!(meta.date, NaiveDate::from_ymd_opt(2025, 6, 1));

        assert!(args(json!({"text": "x"})).metadata().unwrap().is_none());
    }

    #[test]
    fn malformed_date_is_rejected() {
        let err = args(json!({"text": "x", "date": "next tuesday"}))
            .metadata()
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn unknown_type_is_rejected_before_parsing() {
        let err = SPEC
            .parse_args::<MemoryAddArgs>(&json!({"text": "x", "type": "secret"}))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
