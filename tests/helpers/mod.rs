#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentic_gateway::backend::{Chunk, ChunkStream, ModelBackend, ScriptedBackend, ToolCall};
use agentic_gateway::error::GatewayResult;
use agentic_gateway::config::MemorySearchConfig;
use agentic_gateway::integrations::biometrics::UnavailableBiometrics;
use agentic_gateway::memory::MemoryStore;
use agentic_gateway::orchestrator::{EventStream, Orchestrator};
use agentic_gateway::session::{Message, Session, SessionBuilder};
use agentic_gateway::stream::{Event, EventKind};
use agentic_gateway::tools::memory_search::RemoteMemorySearch;
use agentic_gateway::tools::{ToolExecutor, ToolRegistry};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tempfile::TempDir;

/// A store on a fresh on-disk database. Keep the `TempDir` alive for the test.
pub fn temp_store() -> (TempDir, MemoryStore) {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::open(tmp.path().join("memory.db")).unwrap();
    (tmp, store)
}

/// Memory search pointed at a port nothing listens on.
pub fn unreachable_search() -> RemoteMemorySearch {
    search_against(vec!["http://127.0.0.1:9".into()])
}

pub fn search_against(base_urls: Vec<String>) -> RemoteMemorySearch {
    RemoteMemorySearch::new(&MemorySearchConfig {
        base_urls,
        path: "/api/memory/search".into(),
        timeout_secs: 2,
    })
    .unwrap()
}

pub fn executor_with(store: MemoryStore, search: RemoteMemorySearch) -> Arc<ToolExecutor> {
    Arc::new(ToolExecutor::new(
        Arc::new(ToolRegistry::standard()),
        store,
        Arc::new(UnavailableBiometrics),
        search,
        "default",
    ))
}

pub fn executor(store: MemoryStore) -> Arc<ToolExecutor> {
    executor_with(store, unreachable_search())
}

pub fn orchestrator(backend: ScriptedBackend, store: MemoryStore, max_writes: usize) -> Orchestrator {
    orchestrator_with(Arc::new(backend), store, max_writes)
}

pub fn orchestrator_with(backend: Arc<dyn ModelBackend>, store: MemoryStore, max_writes: usize) -> Orchestrator {
    let registry = Arc::new(ToolRegistry::standard());
    Orchestrator::new(
        backend,
        SessionBuilder::offline(registry, "scripted"),
        executor(store),
        max_writes,
    )
}

pub fn memory_add_chunk(id: &str, text: &str) -> Chunk {
    let arguments = json!({ "text": text }).to_string();
    Chunk::tool_call(ToolCall::new(id, "memory_add", json!(arguments)))
}

pub async fn collect(stream: EventStream) -> Vec<Event> {
    stream.collect().await
}

pub fn names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::name).collect()
}

/// Concatenated `content` event text.
pub fn streamed_text(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Content { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Yields `total` text chunks 1 ms apart and counts how many were pulled.
pub struct CountingBackend {
    total: usize,
    pulled: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pulled(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulled)
    }
}

#[async_trait]
impl ModelBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn model(&self) -> &str {
        "counting"
    }

    async fn stream(&self, _session: &Session) -> GatewayResult<ChunkStream> {
        let pulled = Arc::clone(&self.pulled);
        let chunks = futures::stream::iter(0..self.total).then(move |i| {
            let pulled = Arc::clone(&pulled);
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                pulled.fetch_add(1, Ordering::SeqCst);
                let chunk: GatewayResult<Chunk> = Ok(Chunk::text(format!("{i} ")));
                chunk
            }
        });
        Ok(chunks.boxed())
    }
}

/// Records the messages of every session it is asked to stream.
#[derive(Default)]
pub struct CapturingBackend {
    seen: Arc<Mutex<Vec<Message>>>,
}

impl CapturingBackend {
    pub fn seen(&self) -> Arc<Mutex<Vec<Message>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl ModelBackend for CapturingBackend {
    fn name(&self) -> &str {
        "capturing"
    }

    fn model(&self) -> &str {
        "capturing"
    }

    async fn stream(&self, session: &Session) -> GatewayResult<ChunkStream> {
        self.seen.lock().unwrap().extend_from_slice(session.messages());
        Ok(futures::stream::iter(vec![Ok(Chunk::text("ok"))]).boxed())
    }
}
