//! The streaming loop.
//!
//! [`Orchestrator::stream`] returns a lazy event stream. Nothing happens until
//! the caller polls it; dropping it drops the backend stream and any pending
//! tool execution with it.

use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use crate::backend::{ChunkStream, ModelBackend, ToolCall};
use crate::error::GatewayResult;
use crate::session::{HistoryTurn, SessionBuilder};
use crate::stream::{Event, EventStreamTranslator, Step};
use crate::tools::{memory_add, ToolExecutor};

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub conversation_history: Option<Vec<HistoryTurn>>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    sessions: SessionBuilder,
    executor: Arc<ToolExecutor>,
    max_writes: usize,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        sessions: SessionBuilder,
        executor: Arc<ToolExecutor>,
        max_writes: usize,
    ) -> Self {
        Self {
            backend,
            sessions,
            executor,
            max_writes,
        }
    }

    pub fn backend(&self) -> &dyn ModelBackend {
        self.backend.as_ref()
    }

    pub fn max_writes(&self) -> usize {
        self.max_writes
    }

    /// Fails when the session builder cannot produce sessions at all.
    pub fn check_ready(&self) -> GatewayResult<()> {
        self.sessions.check_credential()
    }

    pub fn stream(&self, request: ChatRequest) -> EventStream {
        let driver = Driver {
            backend: Arc::clone(&self.backend),
            sessions: self.sessions.clone(),
            executor: Arc::clone(&self.executor),
            user_id: request.user_id.clone(),
            request: Some(request),
            chunks: None,
            translator: EventStreamTranslator::new(self.max_writes),
            steps: VecDeque::new(),
            finished: false,
        };

        Box::pin(futures::stream::unfold(driver, |mut driver| async move {
            driver.next_event().await.map(|event| (event, driver))
        }))
    }

    /// Drive a stream to the end and return its terminal event.
    pub async fn run(&self, request: ChatRequest) -> Event {
        let mut stream = self.stream(request);
        let mut last = None;
        while let Some(event) = stream.next().await {
            last = Some(event);
        }
        last.unwrap_or_else(|| Event::error("stream ended without a terminal event"))
    }
}

/// Per-stream state, owned by the stream future.
struct Driver {
    backend: Arc<dyn ModelBackend>,
    sessions: SessionBuilder,
    executor: Arc<ToolExecutor>,
    user_id: Option<String>,
    request: Option<ChatRequest>,
    chunks: Option<ChunkStream>,
    translator: EventStreamTranslator,
    steps: VecDeque<Step>,
    finished: bool,
}

impl Driver {
    async fn next_event(&mut self) -> Option<Event> {
        loop {
            if let Some(step) = self.steps.pop_front() {
                match step {
                    Step::Emit(event) => return Some(event),
                    Step::Execute(call) => {
                        if let Some(event) = self.execute_write(call).await {
                            return Some(event);
                        }
                        continue;
                    }
                }
            }
            if self.finished {
                return None;
            }

            if let Some(request) = self.request.take() {
                if let Err(e) = self.open(request).await {
                    self.terminate(Err(e.to_string()));
                }
                continue;
            }

            let Some(chunks) = self.chunks.as_mut() else {
                self.terminate(Err("backend stream was not opened".into()));
                continue;
            };
            let next = chunks.next().await;
            match next {
                Some(Ok(chunk)) => {
                    let steps = self.translator.on_chunk(chunk);
                    self.steps.extend(steps);
                }
                Some(Err(e)) => self.terminate(Err(e.to_string())),
                None => self.terminate(Ok(())),
            }
        }
    }

    async fn open(&mut self, request: ChatRequest) -> GatewayResult<()> {
        let history = request.conversation_history.unwrap_or_default();
        let mut session = self
            .sessions
            .build(request.system_prompt.as_deref(), &history)?;
        session.push_user(request.query);

        tracing::info!(
            backend = self.backend.name(),
            model = session.model(),
            user_id = self.user_id.as_deref().unwrap_or("-"),
            history = history.len(),
            "chat session started"
        );

        // The session is dropped here; the backend stream owns what it needs.
        self.chunks = Some(self.backend.stream(&session).await?);
        Ok(())
    }

    /// Run a memory write unless the cap is reached. Skipped writes produce no event.
    async fn execute_write(&mut self, call: ToolCall) -> Option<Event> {
        if !self.translator.write_allowed() {
            tracing::warn!(
                tool = %call.name,
                id = %call.id,
                writes = self.translator.state().writes,
                "memory write cap reached, skipping"
            );
            return None;
        }

        let mut result = self
            .executor
            .execute(memory_add::NAME, &call.arguments, self.user_id.as_deref())
            .await;
        result.tool = call.name;
        Some(self.translator.on_tool_result(result))
    }

    fn terminate(&mut self, outcome: Result<(), String>) {
        self.chunks = None;
        self.finished = true;

        let translator = std::mem::replace(&mut self.translator, EventStreamTranslator::new(0));
        let state = translator.state();
        let event = match outcome {
            Ok(()) => {
                tracing::info!(
                    content_len = state.content.len(),
                    tool_calls = state.tool_calls.len(),
                    writes = state.writes,
                    "chat session complete"
                );
                translator.complete()
            }
            Err(message) => {
                tracing::error!(error = %message, "chat session failed");
                translator.fail(message)
            }
        };
        self.steps.push_back(Step::Emit(event));
    }
}
