//! Chunk classification.
//!
//! [`EventStreamTranslator`] owns the per-stream [`StreamState`] and turns each
//! backend [`Chunk`] into an ordered list of [`Step`]s. It never performs I/O:
//! memory writes come back as [`Step::Execute`] for the orchestrator to run
//! before it looks at the next step.

use serde_json::{Map, Value};

use super::events::{Event, EventKind, ToolCallRecord};
use crate::backend::{Chunk, ToolCall, Usage};
use crate::tools::{is_memory_write, ToolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Emit(Event),
    /// A memory write the orchestrator should attempt, subject to the cap.
    Execute(ToolCall),
}

#[derive(Debug, Clone)]
pub struct StreamState {
    pub is_thinking: bool,
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub writes: usize,
    pub usage: Usage,
    pub citations: Vec<String>,
    pub server_side_tool_usage: Map<String, Value>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            is_thinking: true,
            content: String::new(),
            tool_calls: Vec::new(),
            writes: 0,
            usage: Usage::default(),
            citations: Vec::new(),
            server_side_tool_usage: Map::new(),
        }
    }
}

#[derive(Debug)]
pub struct EventStreamTranslator {
    state: StreamState,
    max_writes: usize,
}

impl EventStreamTranslator {
    pub fn new(max_writes: usize) -> Self {
        Self {
            state: StreamState::default(),
            max_writes,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn write_allowed(&self) -> bool {
        self.state.writes < self.max_writes
    }

    pub fn on_chunk(&mut self, chunk: Chunk) -> Vec<Step> {
        let mut steps = Vec::new();

        if let Some(usage) = chunk.usage {
            if self.state.is_thinking && usage.reasoning_tokens > 0 {
                steps.push(Step::Emit(Event::now(EventKind::Thinking {
                    tokens: usage.reasoning_tokens,
                })));
            }
            self.state.usage = usage;
        }
        if !chunk.citations.is_empty() {
            self.state.citations = chunk.citations;
        }
        if let Some(map) = chunk.server_side_tool_usage {
            self.state.server_side_tool_usage = map;
        }

        for call in chunk.tool_calls {
            let event = Event::now(EventKind::ToolCall {
                tool: call.name.clone(),
                arguments: call.arguments.clone(),
                id: call.id.clone(),
            });
            self.state.tool_calls.push(ToolCallRecord {
                tool: call.name.clone(),
                arguments: call.arguments.clone(),
                id: call.id.clone(),
                timestamp: event.timestamp,
            });
            steps.push(Step::Emit(event));
            if is_memory_write(&call.name) {
                steps.push(Step::Execute(call));
            }
        }

        if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
            if self.state.is_thinking {
                self.state.is_thinking = false;
                steps.push(Step::Emit(Event::now(EventKind::ResponseStart {})));
            }
            self.state.content.push_str(&text);
            steps.push(Step::Emit(Event::now(EventKind::Content { text })));
        }

        steps
    }

    /// Record the outcome of an executed write and produce its event.
    pub fn on_tool_result(&mut self, result: ToolResult) -> Event {
        if result.is_success() {
            self.state.writes += 1;
        }
        Event::now(EventKind::ToolResult {
            tool: result.tool,
            result: result.result,
            error: result.error,
        })
    }

    /// Terminal success. Consumes the translator so nothing follows it.
    pub fn complete(self) -> Event {
        let state = self.state;
        Event::now(EventKind::Complete {
            content: state.content,
            citations: state.citations,
            usage: state.usage,
            tool_calls: state.tool_calls,
            server_side_tool_usage: state.server_side_tool_usage,
        })
    }

    pub fn fail(self, message: impl Into<String>) -> Event {
        Event::error(message)
    }
}
