//! # HTTP API
//!
//! One run at a time. Starting a run spawns the orchestrator in the
//! background; its events are fanned out to every SSE subscriber and folded
//! into the status snapshot.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
    routing::{get, post},
    Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use synapse_core::config::SynapseConfig;
use synapse_core::cycle::{CycleEvent, CycleEventKind, Orchestrator, OrchestratorConfig, RunResult};
use synapse_core::gateway::Generator;
use synapse_core::memory::ThoughtIndex;
use tokio::sync::{broadcast, mpsc, RwLock};
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    config: SynapseConfig,
    generator: Arc<dyn Generator>,
    index: Option<Arc<dyn ThoughtIndex>>,
    status: RwLock<RunStatus>,
    latest: RwLock<Option<RunResult>>,
    event_tx: broadcast::Sender<CycleEvent>,
}

impl AppState {
    pub fn new(
        config: SynapseConfig,
        generator: Arc<dyn Generator>,
        index: Option<Arc<dyn ThoughtIndex>>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            generator,
            index,
            status: RwLock::new(RunStatus::default()),
            latest: RwLock::new(None),
            event_tx,
        }
    }
}

type SharedState = Arc<AppState>;

/// Snapshot of the current or last run
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunStatus {
    /// idle, running, complete or error
    status: String,
    /// Cycle most recently finished
    cycle: Option<u32>,
    max_cycles: Option<u32>,
    broadcasts: usize,
    error: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            status: "idle".to_string(),
            cycle: None,
            max_cycles: None,
            broadcasts: 0,
            error: None,
        }
    }
}

impl RunStatus {
    fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// Fold one event into the snapshot
    fn observe(&mut self, event: &CycleEvent) {
        match event.kind {
            CycleEventKind::CycleCompleted => self.cycle = event.cycle,
            CycleEventKind::BroadcastProduced | CycleEventKind::BroadcastFailed => {
                self.broadcasts += 1
            }
            _ => {}
        }
    }
}

// === API Types ===

#[derive(Deserialize, ToSchema)]
struct StartRunRequest {
    /// The problem to think about
    prompt: String,
    /// Override the configured number of cycles
    max_cycles: Option<u32>,
}

#[derive(Serialize, ToSchema)]
struct ApiResponse {
    success: bool,
    message: String,
}

#[derive(Serialize, ToSchema)]
struct LatestRunResponse {
    available: bool,
    #[schema(value_type = Option<Object>)]
    result: Option<serde_json::Value>,
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Synapse API",
        version = "1.0.0",
        description = "API for the Synapse Global Workspace attention engine"
    ),
    paths(start_run, get_status, latest_run),
    components(schemas(RunStatus, StartRunRequest, ApiResponse, LatestRunResponse)),
    tags((name = "runs", description = "Cognitive cycle runs"))
)]
struct ApiDoc;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/runs", post(start_run))
        .route("/api/v1/runs/latest", get(latest_run))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/events", get(events))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}

// === API Handlers ===

/// Get run status
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "runs",
    responses(
        (status = 200, description = "Current run status", body = RunStatus)
    )
)]
async fn get_status(State(state): State<SharedState>) -> Json<RunStatus> {
    let status = state.status.read().await;
    Json(status.clone())
}

/// Start a run in the background
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "runs",
    request_body = StartRunRequest,
    responses(
        (status = 202, description = "Run started", body = ApiResponse),
        (status = 400, description = "Empty prompt", body = ApiResponse),
        (status = 409, description = "A run is already in progress", body = ApiResponse)
    )
)]
async fn start_run(
    State(state): State<SharedState>,
    Json(req): Json<StartRunRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse {
                success: false,
                message: "prompt must not be empty".to_string(),
            }),
        );
    }

    let mut orchestrator_config = state.config.orchestrator.clone();
    if let Some(max_cycles) = req.max_cycles {
        orchestrator_config.max_cycles = max_cycles;
    }

    {
        let mut status = state.status.write().await;
        if status.is_running() {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse {
                    success: false,
                    message: "A run is already in progress".to_string(),
                }),
            );
        }
        *status = RunStatus {
            status: "running".to_string(),
            max_cycles: Some(orchestrator_config.max_cycles),
            ..RunStatus::default()
        };
    }

    tracing::info!("Starting run: {}", req.prompt);

    tokio::spawn(execute_run(state.clone(), orchestrator_config, req.prompt.clone()));

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            success: true,
            message: format!("Run started with prompt: {}", req.prompt),
        }),
    )
}

/// Run the orchestrator to the end and record the outcome.
///
/// The terminal status is written only after every event of this run has been
/// folded in, so a follow-up run never sees stale cycle numbers.
async fn execute_run(state: SharedState, orchestrator_config: OrchestratorConfig, prompt: String) {
    let (event_mpsc_tx, mut event_mpsc_rx) = mpsc::channel::<CycleEvent>(256);

    // Bridge events to subscribers and the status snapshot
    let bridge_state = state.clone();
    let bridge = tokio::spawn(async move {
        while let Some(event) = event_mpsc_rx.recv().await {
            bridge_state.status.write().await.observe(&event);
            let _ = bridge_state.event_tx.send(event);
        }
    });

    let mut orchestrator = Orchestrator::new(
        orchestrator_config,
        state.config.workspace.clone(),
        state.generator.clone(),
    )
    .with_event_channel(event_mpsc_tx);
    if let Some(index) = &state.index {
        orchestrator = orchestrator.with_thought_index(index.clone());
    }

    let outcome = orchestrator.run(&prompt).await;
    // Closing the sender lets the bridge drain and exit
    drop(orchestrator);
    if let Err(e) = bridge.await {
        tracing::error!("Event bridge task failed: {}", e);
    }

    match outcome {
        Ok(result) => {
            tracing::info!(
                cycles = result.cycles_executed,
                broadcasts = result.broadcasts.len(),
                "Run completed"
            );
            *state.latest.write().await = Some(result);
            state.status.write().await.status = "complete".to_string();
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            let mut status = state.status.write().await;
            status.status = "error".to_string();
            status.error = Some(e.to_string());
        }
    }
}

/// Result of the last completed run
#[utoipa::path(
    get,
    path = "/api/v1/runs/latest",
    tag = "runs",
    responses(
        (status = 200, description = "Last run result, if any", body = LatestRunResponse)
    )
)]
async fn latest_run(State(state): State<SharedState>) -> Json<LatestRunResponse> {
    let latest = state.latest.read().await;
    let result = latest
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok());
    Json(LatestRunResponse {
        available: result.is_some(),
        result,
    })
}

/// SSE endpoint for real-time events with heartbeat
async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    // Heartbeat comment every 15 seconds of silence
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await {
                Ok(Ok(event)) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    return Some((Ok(Event::default().event("cycle").data(json)), rx));
                }
                // Slow subscriber; skip what was dropped
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    tracing::warn!("SSE subscriber lagged by {} events", n);
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return Some((Ok(Event::default().comment("heartbeat")), rx)),
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// === OpenAPI Handler ===

async fn serve_openapi() -> impl IntoResponse {
    let doc = ApiDoc::openapi().to_json().unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(doc),
    )
        .into_response()
}
