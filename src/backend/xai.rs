//! xAI chat completions backend (OpenAI-compatible streaming wire format).

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use super::{Chunk, ChunkStream, ModelBackend, ToolCall, Usage};
use crate::config::ModelConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::session::Session;
use crate::tools::ToolRegistry;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct XaiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl XaiBackend {
    pub fn new(config: &ModelConfig) -> GatewayResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GatewayError::Configuration("XAI_API_KEY is not set".into()))?;

        // No overall timeout: reasoning models can stream for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn request_body(&self, session: &Session) -> Value {
        json!({
            "model": session.model(),
            "messages": session.messages(),
            "stream": true,
            "stream_options": {"include_usage": true},
            "tools": tool_definitions(session.tools()),
        })
    }
}

/// Client tools go out as function tools; server tools by name only.
pub fn tool_definitions(registry: &ToolRegistry) -> Vec<Value> {
    registry
        .list()
        .iter()
        .map(|spec| {
            if spec.is_client() {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.parameters_schema(),
                    }
                })
            } else {
                json!({"type": spec.name})
            }
        })
        .collect()
}

#[async_trait]
impl ModelBackend for XaiBackend {
    fn name(&self) -> &str {
        "xai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(&self, session: &Session) -> GatewayResult<ChunkStream> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = session.model(), "opening xai stream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(session))
            .send()
            .await
            .map_err(|e| GatewayError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Backend(format!("HTTP {status}: {text}")));
        }

        let state = DecodeState {
            bytes: Box::pin(response.bytes_stream()),
            decoder: StreamDecoder::default(),
            pending: VecDeque::new(),
            ended: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.ended {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(bytes)) => {
                        state.pending.extend(state.decoder.feed(bytes.as_ref()));
                        if state.decoder.is_done() {
                            state.ended = true;
                        }
                    }
                    Some(Err(e)) => {
                        state.ended = true;
                        state
                            .pending
                            .push_back(Err(GatewayError::Backend(format!("stream interrupted: {e}"))));
                    }
                    None => {
                        state.ended = true;
                        state.pending.extend(state.decoder.finish());
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: StreamDecoder,
    pending: VecDeque<GatewayResult<Chunk>>,
    ended: bool,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
    #[serde(default)]
    citations: Vec<String>,
    server_side_tool_usage: Option<Map<String, Value>>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
    completion_tokens_details: Option<WireCompletionDetails>,
    reasoning_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireCompletionDetails {
    #[serde(default)]
    reasoning_tokens: u64,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        let reasoning_tokens = wire
            .completion_tokens_details
            .map(|d| d.reasoning_tokens)
            .or(wire.reasoning_tokens)
            .unwrap_or(0);
        Self {
            completion_tokens: wire.completion_tokens,
            prompt_tokens: wire.prompt_tokens,
            total_tokens: wire.total_tokens,
            reasoning_tokens,
        }
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Incremental SSE decoder. Tool-call fragments are accumulated by index and
/// released as complete [`ToolCall`]s once the choice finishes.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    done: bool,
}

impl StreamDecoder {
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns every chunk completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GatewayResult<Chunk>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                out.extend(self.flush_tool_calls().map(Ok));
                continue;
            }
            if let Some(item) = self.decode(data) {
                out.push(item);
            }
        }
        out
    }

    /// End of input without `[DONE]`: release any buffered tool calls.
    pub fn finish(&mut self) -> Vec<GatewayResult<Chunk>> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        self.flush_tool_calls().map(Ok).into_iter().collect()
    }

    fn decode(&mut self, data: &str) -> Option<GatewayResult<Chunk>> {
        let wire: WireChunk = match serde_json::from_str(data) {
            Ok(w) => w,
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable stream line");
                return None;
            }
        };

        if let Some(error) = wire.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Some(Err(GatewayError::Backend(message)));
        }

        let mut chunk = Chunk {
            usage: wire.usage.map(Usage::from),
            citations: wire.citations,
            server_side_tool_usage: wire.server_side_tool_usage,
            ..Default::default()
        };

        let mut finished = false;
        for choice in wire.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                chunk.content.get_or_insert_with(String::new).push_str(&content);
            }
            for delta in choice.delta.tool_calls {
                let entry = self.tool_calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    entry.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
            finished |= choice.finish_reason.is_some();
        }

        if finished {
            if let Some(calls) = self.flush_tool_calls() {
                chunk.tool_calls = calls.tool_calls;
            }
        }

        (!chunk.is_empty()).then_some(Ok(chunk))
    }

    fn flush_tool_calls(&mut self) -> Option<Chunk> {
        if self.tool_calls.is_empty() {
            return None;
        }
        let calls = std::mem::take(&mut self.tool_calls)
            .into_values()
            .filter(|p| !p.name.is_empty())
            .map(|p| ToolCall::new(p.id, p.name, Value::String(p.arguments)))
            .collect();
        Some(Chunk {
            tool_calls: calls,
            ..Default::default()
        })
    }
}
