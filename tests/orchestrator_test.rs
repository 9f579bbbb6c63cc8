mod helpers;

use std::time::Duration;

use agentic_gateway::backend::scripted::ScriptStep;
use agentic_gateway::backend::{Chunk, ScriptedBackend, ToolCall, Usage};
use agentic_gateway::orchestrator::ChatRequest;
use agentic_gateway::stream::EventKind;
use serde_json::json;

fn request(query: &str) -> ChatRequest {
    ChatRequest {
        user_id: Some("u1".into()),
        ..ChatRequest::new(query)
    }
}

#[tokio::test]
async fn complete_content_is_the_concatenation_of_content_events() {
    let (_tmp, store) = helpers::temp_store();
    let fragments = ["The ", "quick ", "brown ", "fox", "."];
    let backend = ScriptedBackend::new(fragments.iter().map(|f| Chunk::text(*f)).collect());
    let orchestrator = helpers::orchestrator(backend, store, 3);

    let events = helpers::collect(orchestrator.stream(request("tell me"))).await;

    assert_eq!(helpers::streamed_text(&events), "The quick brown fox.");
    match &events.last().unwrap().kind {
        EventKind::Complete { content, tool_calls, .. } => {
            assert_eq!(content, "The quick brown fox.");
            assert!(tool_calls.is_empty());
        }
        other => panic!("expected complete, got {other:?}"),
    }
}

#[tokio::test]
async fn response_start_precedes_the_first_content_exactly_once() {
    let (_tmp, store) = helpers::temp_store();
    let backend = ScriptedBackend::new(vec![
        Chunk::reasoning(8),
        Chunk::reasoning(16),
        Chunk::text("Hi"),
        Chunk::reasoning(20),
        Chunk::text(" there"),
    ]);
    let orchestrator = helpers::orchestrator(backend, store, 3);

    let events = helpers::collect(orchestrator.stream(request("hello"))).await;

    assert_eq!(
        helpers::names(&events),
        vec![
            "thinking",
            "thinking",
            "response_start",
            "content",
            "content",
            "complete",
        ]
    );
    assert_eq!(events[1].kind, EventKind::Thinking { tokens: 16 });
}

#[tokio::test]
async fn write_cap_limits_executed_memory_adds() {
    let (_tmp, store) = helpers::temp_store();
    let max_writes = 2;
    let chunks: Vec<Chunk> = (0..5)
        .map(|i| helpers::memory_add_chunk(&format!("call_{i}"), &format!("fact number {i}")))
        .chain([Chunk::text("Noted.")])
        .collect();
    let orchestrator = helpers::orchestrator(ScriptedBackend::new(chunks), store.clone(), max_writes);

    let events = helpers::collect(orchestrator.stream(request("remember all of these"))).await;

    let names = helpers::names(&events);
    assert_eq!(names.iter().filter(|n| **n == "tool_call").count(), 5);
    assert_eq!(names.iter().filter(|n| **n == "tool_result").count(), max_writes);
    assert_eq!(store.count("u1").await.unwrap(), max_writes);

    match &events.last().unwrap().kind {
        EventKind::Complete { tool_calls, .. } => assert_eq!(tool_calls.len(), 5),
        other => panic!("expected complete, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_writes_do_not_use_up_the_cap() {
    let (_tmp, store) = helpers::temp_store();
    let chunks = vec![
        Chunk::tool_call(ToolCall::new("bad", "memory_add", json!({"text": "  "}))),
        helpers::memory_add_chunk("good", "likes tea"),
    ];
    let orchestrator = helpers::orchestrator(ScriptedBackend::new(chunks), store.clone(), 1);

    let events = helpers::collect(orchestrator.stream(request("x"))).await;

    let results: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::ToolResult { result, error, .. } => Some((result.clone(), error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_some());
    assert_eq!(results[1].0.as_ref().unwrap()["success"], true);
    assert_eq!(store.count("u1").await.unwrap(), 1);
}

#[tokio::test]
async fn remember_scenario_emits_call_result_and_complete() {
    let (_tmp, store) = helpers::temp_store();
    let backend = ScriptedBackend::new(vec![
        Chunk::reasoning(5),
        helpers::memory_add_chunk("call_1", "User likes flat whites"),
        Chunk::text("Got it, "),
        Chunk::text("I'll remember that.").with_usage(Usage {
            completion_tokens: 9,
            prompt_tokens: 120,
            total_tokens: 129,
            reasoning_tokens: 5,
        }),
    ]);
    let orchestrator = helpers::orchestrator(backend, store.clone(), 3);

    let events = helpers::collect(orchestrator.stream(request("remember I like flat whites"))).await;

    assert_eq!(
        helpers::names(&events),
        vec![
            "thinking",
            "tool_call",
            "tool_result",
            "response_start",
            "content",
            "content",
            "complete",
        ]
    );
    match &events[2].kind {
        EventKind::ToolResult { tool, result, error } => {
            assert_eq!(tool, "memory_add");
            assert_eq!(result.as_ref().unwrap()["success"], true);
            assert!(error.is_none());
        }
        other => panic!("expected tool_result, got {other:?}"),
    }
    match &events[6].kind {
        EventKind::Complete { tool_calls, usage, .. } => {
            assert_eq!(tool_calls.len(), 1);
            assert_eq!(tool_calls[0].tool, "memory_add");
            assert_eq!(tool_calls[0].id, "call_1");
            assert_eq!(usage.total_tokens, 129);
        }
        other => panic!("expected complete, got {other:?}"),
    }

    let stored = store.list("u1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "User likes flat whites");
}

#[tokio::test]
async fn server_and_non_write_tool_calls_are_only_observed() {
    let (_tmp, store) = helpers::temp_store();
    let backend = ScriptedBackend::new(vec![
        Chunk::tool_call(ToolCall::new("s1", "web_search", json!({"query": "news"}))),
        Chunk::tool_call(ToolCall::new("c1", "whoop_data_query", json!({"data_type": "sleep"}))),
        Chunk::text("done"),
    ]);
    let orchestrator = helpers::orchestrator(backend, store, 3);

    let events = helpers::collect(orchestrator.stream(request("q"))).await;
    assert_eq!(
        helpers::names(&events),
        vec!["tool_call", "tool_call", "response_start", "content", "complete"]
    );
}

#[tokio::test]
async fn backend_failure_mid_stream_ends_with_a_single_error() {
    let (_tmp, store) = helpers::temp_store();
    let backend = ScriptedBackend::from_steps(vec![
        ScriptStep::Chunk(Chunk::text("partial")),
        ScriptStep::Fail("connection reset".into()),
        ScriptStep::Chunk(Chunk::text("never seen")),
    ]);
    let orchestrator = helpers::orchestrator(backend, store, 3);

    let events = helpers::collect(orchestrator.stream(request("q"))).await;

    assert_eq!(
        helpers::names(&events),
        vec!["response_start", "content", "error"]
    );
    match &events[2].kind {
        EventKind::Error { error } => assert!(error.contains("connection reset")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn backend_refusing_to_open_yields_only_an_error() {
    let (_tmp, store) = helpers::temp_store();
    let orchestrator = helpers::orchestrator(ScriptedBackend::refusing("HTTP 401"), store, 3);

    let event = orchestrator.run(request("q")).await;
    assert!(event.is_terminal());
    assert_eq!(event.name(), "error");
}

#[tokio::test]
async fn run_returns_the_complete_event() {
    let (_tmp, store) = helpers::temp_store();
    let orchestrator = helpers::orchestrator(ScriptedBackend::echo(), store, 3);

    let event = orchestrator.run(request("echo this back")).await;
    match event.kind {
        EventKind::Complete { content, .. } => assert_eq!(content, "echo this back"),
        other => panic!("expected complete, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_sessions_do_not_interleave() {
    let (_tmp, store) = helpers::temp_store();
    let delay = Duration::from_millis(5);
    let a_words: Vec<Chunk> = (0..10).map(|i| Chunk::text(format!("alpha{i} "))).collect();
    let b_words: Vec<Chunk> = (0..10).map(|i| Chunk::text(format!("bravo{i} "))).collect();

    let a = helpers::orchestrator(ScriptedBackend::new(a_words).with_delay(delay), store.clone(), 3);
    let b = helpers::orchestrator(ScriptedBackend::new(b_words).with_delay(delay), store, 3);

    let (a_events, b_events) = tokio::join!(
        helpers::collect(a.stream(request("a"))),
        helpers::collect(b.stream(request("b"))),
    );

    let a_text = helpers::streamed_text(&a_events);
    let b_text = helpers::streamed_text(&b_events);
    assert!(a_text.starts_with("alpha0 ") && !a_text.contains("bravo"));
    assert!(b_text.starts_with("bravo0 ") && !b_text.contains("alpha"));
}

#[tokio::test]
async fn dropping_the_stream_stops_consuming_the_backend() {
    use futures::StreamExt;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    let (_tmp, store) = helpers::temp_store();
    let backend = helpers::CountingBackend::new(100);
    let pulled = backend.pulled();
    let orchestrator = helpers::orchestrator_with(Arc::new(backend), store, 3);

    let mut stream = orchestrator.stream(request("q"));
    let first = stream.next().await.unwrap();
    assert_eq!(first.name(), "response_start");
    drop(stream);

    let before = pulled.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after = pulled.load(Ordering::SeqCst);

    assert!(before < 100);
    assert_eq!(before, after, "backend kept streaming after the client went away");
}

#[tokio::test]
async fn history_and_prompt_reach_the_backend_in_order() {
    use agentic_gateway::session::{HistoryTurn, Message, MEMORY_POLICY};
    use std::sync::Arc;

    let (_tmp, store) = helpers::temp_store();
    let backend = helpers::CapturingBackend::default();
    let seen = backend.seen();
    let orchestrator = helpers::orchestrator_with(Arc::new(backend), store, 3);

    let request = ChatRequest {
        query: "latest question".into(),
        system_prompt: Some("Be brief.".into()),
        conversation_history: Some(vec![
            HistoryTurn {
                role: "user".into(),
                content: "earlier".into(),
            },
            HistoryTurn {
                role: "assistant".into(),
                content: "noted".into(),
            },
        ]),
        user_id: None,
    };
    match orchestrator.run(request).await.kind {
        EventKind::Complete { content, .. } => assert_eq!(content, "ok"),
        other => panic!("expected complete, got {other:?}"),
    }

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Message::system(MEMORY_POLICY),
            Message::system("Be brief."),
            Message::user("earlier"),
            Message::assistant("noted"),
            Message::user("latest question"),
        ]
    );
}
