//! HTTP API for agent reports, inventory queries, health checks and metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use leader_lib::{
    health::{ComponentStatus, HealthRegistry},
    topology::AgentView,
    AgentReport, LeaderResourceTracker, Location, LocationError, ReportError, ResourceError,
    TopologySnapshot, UpdateOutcome,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<LeaderResourceTracker>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(tracker: Arc<LeaderResourceTracker>, health_registry: HealthRegistry) -> Self {
        Self {
            tracker,
            health_registry,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidLocation(#[from] LocationError),

    #[error(transparent)]
    InvalidReport(#[from] ReportError),

    #[error(transparent)]
    Rejected(#[from] ResourceError),

    #[error("no agent registered at {0}")]
    AgentNotFound(Location),

    #[error("failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidLocation(_) | ApiError::InvalidReport(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(ResourceError::Negative { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(ResourceError::Overflow { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

/// Accept a heartbeat or resource report from an agent
async fn report(
    State(state): State<Arc<AppState>>,
    Json(report): Json<AgentReport>,
) -> Result<(StatusCode, Json<UpdateOutcome>), ApiError> {
    report.validate()?;
    let outcome = state
        .tracker
        .update_agent_information(report.into())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    Query(location): Query<Location>,
) -> Result<Json<AgentView>, ApiError> {
    location.validate()?;
    match state.tracker.find_agent_information(&location).await {
        Some(agent) => Ok(Json(AgentView::from_agent(&agent, Instant::now()))),
        None => Err(ApiError::AgentNotFound(location)),
    }
}

/// Explicit deregistration; removing an unknown agent is not an error
async fn remove_agent(
    State(state): State<Arc<AppState>>,
    Query(location): Query<Location>,
) -> Result<Json<RemoveResponse>, ApiError> {
    location.validate()?;
    let removed = state
        .tracker
        .delete_agent_information(&location)
        .await
        .is_some();
    Ok(Json(RemoveResponse { removed }))
}

async fn topology(State(state): State<Arc<AppState>>) -> Json<TopologySnapshot> {
    Json(state.tracker.snapshot().await)
}

/// Health check response - returns 200 if healthy, 503 if a task stopped
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer).map_err(|e| {
        warn!(error = %e, "Failed to encode metrics");
        ApiError::from(e)
    })?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/agents", post(report))
        .route("/v1/agent", get(get_agent).delete(remove_agent))
        .route("/v1/topology", get(topology))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, returning when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
