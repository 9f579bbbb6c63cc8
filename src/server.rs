//! HTTP surface: chat streaming over SSE plus the memory endpoints.

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::create_backend;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::integrations::biometrics::{BiometricSource, HttpBiometricSource, UnavailableBiometrics};
use crate::integrations::status::{DataStatusSource, HttpStatusSource};
use crate::memory::{MemoryMetadata, MemoryStore};
use crate::orchestrator::{ChatRequest, Orchestrator};
use crate::session::SessionBuilder;
use crate::stream::Event;
use crate::tools::memory_search::RemoteMemorySearch;
use crate::tools::{ToolExecutor, ToolRegistry};

const SERVICE_NAME: &str = "agentic-gateway";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: MemoryStore,
    pub registry: Arc<ToolRegistry>,
    pub status: Option<Arc<dyn DataStatusSource>>,
    pub default_user_id: String,
    pub default_limit: usize,
}

impl AppState {
    fn user_or_default(&self, user_id: Option<String>) -> String {
        user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.default_user_id.clone())
    }
}

/// Wire every collaborator from config.
pub fn build_state(config: &GatewayConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let store = MemoryStore::open(&db_path)
        .with_context(|| format!("failed to open memory store at {}", db_path.display()))?;
    tracing::info!(db = %db_path.display(), "memory store ready");

    let registry = Arc::new(ToolRegistry::standard());
    let integration_timeout = Duration::from_secs(config.integrations.timeout_secs);

    let biometrics: Arc<dyn BiometricSource> = match &config.integrations.biometrics_url {
        Some(url) => Arc::new(HttpBiometricSource::new(url.clone(), integration_timeout)?),
        None => {
            tracing::info!("no biometrics URL configured; whoop_data_query reports unavailable");
            Arc::new(UnavailableBiometrics)
        }
    };
    let status: Option<Arc<dyn DataStatusSource>> = match &config.integrations.status_url {
        Some(url) => Some(Arc::new(HttpStatusSource::new(url.clone(), integration_timeout)?)),
        None => None,
    };

    let executor = Arc::new(ToolExecutor::new(
        Arc::clone(&registry),
        store.clone(),
        biometrics,
        RemoteMemorySearch::new(&config.memory_search)?,
        config.memory.default_user_id.clone(),
    ));

    let backend = create_backend(&config.model)?;
    let sessions = match config.model.provider.as_str() {
        "scripted" => SessionBuilder::offline(Arc::clone(&registry), config.model.model.clone()),
        _ => SessionBuilder::new(
            Arc::clone(&registry),
            config.model.model.clone(),
            config.credential().map(str::to_string),
        ),
    };
    tracing::info!(
        provider = backend.name(),
        model = %config.model.model,
        max_writes = config.memory.max_writes_per_chat,
        "model backend ready"
    );

    Ok(AppState {
        orchestrator: Orchestrator::new(
            backend,
            sessions,
            executor,
            config.memory.max_writes_per_chat,
        ),
        store,
        registry,
        status,
        default_user_id: config.memory.default_user_id.clone(),
        default_limit: config.memory.default_limit,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/stream", post(chat_stream))
        .route("/chat", post(chat))
        .route("/memory/add", post(memory_add))
        .route("/memory/search", post(memory_search))
        .route("/memory/list", get(memory_list))
        .route("/health", get(health))
        .route("/db/status", get(db_status))
        .with_state(state)
}

/// Start the HTTP server and run until ctrl-c.
pub async fn serve(config: GatewayConfig) -> Result<()> {
    config.validate()?;
    let state = build_state(&config)?;
    state.orchestrator.check_ready()?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "gateway listening at http://{bind_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down gateway");
        })
        .await?;

    Ok(())
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_) | GatewayError::UnknownTool(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) | GatewayError::Backend(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Configuration(_) | GatewayError::Storage(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

/// `Json` whose rejections (malformed body, missing or mistyped fields) are
/// reported as [`GatewayError::Validation`], so every failure shares the
/// `{"error": ...}` body.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(GatewayError::validation(rejection.body_text())),
        }
    }
}

fn require_query(request: &ChatRequest) -> GatewayResult<()> {
    if request.query.trim().is_empty() {
        return Err(GatewayError::validation("query is required"));
    }
    Ok(())
}

fn to_sse(event: &Event) -> SseEvent {
    match SseEvent::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => SseEvent::default()
            .event("error")
            .data(json!({"type": "error", "error": e.to_string()}).to_string()),
    }
}

async fn chat_stream(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> GatewayResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    require_query(&request)?;
    let events = state
        .orchestrator
        .stream(request)
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn chat(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> GatewayResult<Json<Event>> {
    require_query(&request)?;
    Ok(Json(state.orchestrator.run(request).await))
}

#[derive(Debug, Deserialize)]
struct AddMemoryBody {
    text: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    metadata: Option<MemoryMetadata>,
}

async fn memory_add(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<AddMemoryBody>,
) -> GatewayResult<Json<Value>> {
    let user_id = state.user_or_default(body.user_id);
    let metadata = body.metadata.filter(|m| !m.is_empty());
    let outcome = state.store.add(&user_id, &body.text, metadata).await?;

    let mut response = json!({"success": true, "id": outcome.id});
    if outcome.deduped {
        response["dedup"] = json!(true);
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct SearchMemoryBody {
    query: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn memory_search(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SearchMemoryBody>,
) -> GatewayResult<Json<Value>> {
    let user_id = state.user_or_default(body.user_id);
    let limit = body.limit.unwrap_or(state.default_limit);
    let results = state.store.search(&user_id, &body.query, limit).await?;
    Ok(Json(json!({"results": results})))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    user_id: Option<String>,
}

async fn memory_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> GatewayResult<Json<Value>> {
    let user_id = state.user_or_default(params.user_id);
    let results = state.store.list(&user_id).await?;
    Ok(Json(json!({"results": results})))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "model": state.orchestrator.backend().model(),
        "tools": state.registry.names(),
    }))
}

async fn db_status(State(state): State<AppState>) -> Response {
    let Some(source) = state.status.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "time-series status source not configured"})),
        )
            .into_response();
    };
    match source.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => e.into_response(),
    }
}
