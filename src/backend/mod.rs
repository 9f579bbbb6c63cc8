//! Model backend seam.
//!
//! A [`ModelBackend`] turns a [`Session`] into a stream of [`Chunk`]s. Each
//! chunk may carry a usage snapshot (including reasoning-token progress),
//! completed tool-call announcements, and a text fragment. The stream
//! translator interprets them; backends only normalize their wire format.

pub mod scripted;
pub mod xai;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::session::Session;

pub use scripted::ScriptedBackend;
pub use xai::XaiBackend;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw arguments: the JSON string the model produced, or an object.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Token accounting snapshot. Backends report cumulative values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub completion_tokens: u64,
    pub prompt_tokens: u64,
    pub total_tokens: u64,
    pub reasoning_tokens: u64,
}

/// One incremental unit of backend output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub citations: Vec<String>,
    pub server_side_tool_usage: Option<Map<String, Value>>,
}

impl Chunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Default::default()
        }
    }

    /// A progress-only chunk reporting cumulative reasoning tokens.
    pub fn reasoning(tokens: u64) -> Self {
        Self {
            usage: Some(Usage {
                reasoning_tokens: tokens,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_citations(mut self, citations: Vec<String>) -> Self {
        self.citations = citations;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.tool_calls.is_empty()
            && self.usage.is_none()
            && self.citations.is_empty()
            && self.server_side_tool_usage.is_none()
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = GatewayResult<Chunk>> + Send>>;

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Provider name, e.g. `"xai"`.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Open a streaming completion for `session`. Errors opening the stream
    /// and errors mid-stream both end the exchange with an `error` event.
    async fn stream(&self, session: &Session) -> GatewayResult<ChunkStream>;
}

/// Create a backend from config. `scripted` is an offline echo backend.
pub fn create_backend(config: &ModelConfig) -> GatewayResult<Arc<dyn ModelBackend>> {
    match config.provider.as_str() {
        "xai" => Ok(Arc::new(XaiBackend::new(config)?)),
        "scripted" => Ok(Arc::new(ScriptedBackend::echo())),
        other => Err(GatewayError::Configuration(format!(
            "unknown model provider: {other}. Supported: xai, scripted"
        ))),
    }
}
