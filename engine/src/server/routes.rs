//! HTTP route handlers for the presentation API

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::debug;

use crate::geo::{Coordinate, CoordinateError};
use crate::position::{ChannelSensor, PositionError};
use crate::session::{RouteView, TrackingStatus};
use crate::stream::StreamStatus;
use crate::tracking::TrackedEntity;

/// Shared state for the presentation routes
#[derive(Clone)]
pub struct AppState {
    pub view: watch::Receiver<RouteView>,
    pub sensor: Arc<ChannelSensor>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(view: watch::Receiver<RouteView>, sensor: Arc<ChannelSensor>) -> Self {
        Self {
            view,
            sensor,
            started_at: Instant::now(),
        }
    }

    fn current(&self) -> RouteView {
        self.view.borrow().clone()
    }
}

/// Error body for the presentation API
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl From<CoordinateError> for ApiError {
    fn from(e: CoordinateError) -> Self {
        Self {
            error: e.to_string(),
            code: "invalid_coordinate".to_string(),
        }
    }
}

impl From<PositionError> for ApiError {
    fn from(e: PositionError) -> Self {
        let code = match &e {
            PositionError::PermissionDenied => "permission_denied",
            PositionError::Unavailable(_) => "sensor_unavailable",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "invalid_coordinate" => StatusCode::UNPROCESSABLE_ENTITY,
            "permission_denied" => StatusCode::FORBIDDEN,
            "sensor_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tracking: TrackingStatus,
    pub stream: StreamStatus,
    pub entities: usize,
    pub uptime_seconds: u64,
}

/// Body of POST /api/position
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let view = state.current();
    let status = match (view.tracking, view.stream) {
        (TrackingStatus::Tracking, StreamStatus::Connected | StreamStatus::Idle) => "healthy",
        _ => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracking: view.tracking,
        stream: view.stream,
        entities: view.entities.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// GET /api/route - the latest published view
pub async fn get_route(State(state): State<AppState>) -> Json<RouteView> {
    Json(state.current())
}

/// GET /api/entities - tracked entities ordered by id
pub async fn list_entities(State(state): State<AppState>) -> Json<Vec<TrackedEntity>> {
    Json(state.current().entities)
}

/// POST /api/position - feed a fix to the local sensor
pub async fn post_position(
    State(state): State<AppState>,
    Json(request): Json<PositionRequest>,
) -> Result<StatusCode, ApiError> {
    let fix = Coordinate::new(request.latitude, request.longitude)?;
    state.sensor.push(fix)?;
    debug!("Accepted position fix {:?}", fix);
    Ok(StatusCode::ACCEPTED)
}

/// Build the presentation router
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/route", get(get_route))
        .route("/api/entities", get(list_entities))
        .route("/api/position", post(post_position))
        .with_state(state)
}
