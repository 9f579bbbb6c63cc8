use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::Usage;

/// A tool call as reported in the terminal `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: Value,
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Thinking {
        tokens: u64,
    },
    ToolCall {
        tool: String,
        arguments: Value,
        id: String,
    },
    ToolResult {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ResponseStart {},
    Content {
        text: String,
    },
    Complete {
        content: String,
        citations: Vec<String>,
        usage: Usage,
        tool_calls: Vec<ToolCallRecord>,
        server_side_tool_usage: Map<String, Value>,
    },
    Error {
        error: String,
    },
}

/// One unit of the external stream. Serializes as the kind's fields plus
/// `type` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::now(EventKind::Error {
            error: message.into(),
        })
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Thinking { .. } => "thinking",
            EventKind::ToolCall { .. } => "tool_call",
            EventKind::ToolResult { .. } => "tool_result",
            EventKind::ResponseStart {} => "response_start",
            EventKind::Content { .. } => "content",
            EventKind::Complete { .. } => "complete",
            EventKind::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Complete { .. } | EventKind::Error { .. })
    }
}
