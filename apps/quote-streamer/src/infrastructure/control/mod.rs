//! Control, Health and Metrics Endpoint
//!
//! HTTP endpoint for driving the stream and observing it. The start route
//! is the user-facing restart affordance; it is idempotent like the
//! scheduler behind it.
//!
//! # Endpoints
//!
//! - `POST /stream/start` - Start polling (no-op when already streaming, 409 after teardown)
//! - `POST /stream/stop` - Stop polling (no-op when idle)
//! - `GET /stream/status` - Scheduler state and dataset size as JSON
//! - `GET /dataset` - Current snapshot as a JSON array of quotes
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::events::SessionId;
use crate::application::services::{
    SchedulerError, SchedulerStatus, StartOutcome, StopOutcome, ViewBinder,
};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Stream status response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Scheduler status.
    pub scheduler: SchedulerStatus,
    /// Records in the current snapshot.
    pub dataset_len: usize,
    /// Snapshot version.
    pub dataset_version: u64,
}

/// Result of a start or stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    /// What the request did.
    pub outcome: ControlOutcome,
    /// Session affected, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,
}

/// Control request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    /// A new session began.
    Started,
    /// Already streaming; nothing changed.
    AlreadyStreaming,
    /// The session was stopped.
    Stopped,
    /// Already idle; nothing changed.
    AlreadyIdle,
}

impl From<StartOutcome> for ControlResponse {
    fn from(outcome: StartOutcome) -> Self {
        match outcome {
            StartOutcome::Started(id) => Self {
                outcome: ControlOutcome::Started,
                session: Some(id),
            },
            StartOutcome::AlreadyStreaming(id) => Self {
                outcome: ControlOutcome::AlreadyStreaming,
                session: Some(id),
            },
        }
    }
}

impl From<StopOutcome> for ControlResponse {
    fn from(outcome: StopOutcome) -> Self {
        match outcome {
            StopOutcome::Stopped(id) => Self {
                outcome: ControlOutcome::Stopped,
                session: Some(id),
            },
            StopOutcome::AlreadyIdle => Self {
                outcome: ControlOutcome::AlreadyIdle,
                session: None,
            },
        }
    }
}

// =============================================================================
// Control Server State
// =============================================================================

/// Shared state for the control server.
#[derive(Debug)]
pub struct ControlServerState {
    version: String,
    started_at: Instant,
    binder: Arc<ViewBinder>,
}

impl ControlServerState {
    /// Create new control server state.
    #[must_use]
    pub fn new(version: String, binder: Arc<ViewBinder>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            binder,
        }
    }
}

// =============================================================================
// Control Server
// =============================================================================

/// Control HTTP server.
pub struct ControlServer {
    port: u16,
    state: Arc<ControlServerState>,
    cancel: CancellationToken,
}

impl ControlServer {
    /// Create a new control server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ControlServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the control server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ControlServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ControlServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ControlServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Control server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ControlServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}

/// Build the control router.
pub fn router(state: Arc<ControlServerState>) -> Router {
    Router::new()
        .route("/stream/start", post(start_handler))
        .route("/stream/stop", post(stop_handler))
        .route("/stream/status", get(status_handler))
        .route("/dataset", get(dataset_handler))
        .route("/healthz", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn start_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    match state.binder.request_start() {
        Ok(outcome) => {
            tracing::info!(session = outcome.session(), "Start requested");
            (StatusCode::OK, Json(ControlResponse::from(outcome))).into_response()
        }
        Err(e @ SchedulerError::Deactivated) => {
            tracing::warn!(error = %e, "Start refused");
            (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Start request failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn stop_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    let outcome = state.binder.stop();
    tracing::info!(?outcome, "Stop requested");
    (StatusCode::OK, Json(ControlResponse::from(outcome)))
}

async fn status_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    Json(build_status_response(&state))
}

async fn dataset_handler(State(state): State<Arc<ControlServerState>>) -> impl IntoResponse {
    Json(state.binder.snapshot())
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_status_response(state: &ControlServerState) -> StatusResponse {
    let snapshot = state.binder.snapshot();
    StatusResponse {
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        scheduler: state.binder.status(),
        dataset_len: snapshot.len(),
        dataset_version: snapshot.version(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Control server errors.
#[derive(Debug, thiserror::Error)]
pub enum ControlServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
