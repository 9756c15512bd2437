//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::snapshot::MatchSnapshot;
use crate::game::{Match, MatchConfig, RosterEntry, StartError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/matches", post(create_match_handler))
        .route("/matches/:id", get(snapshot_handler))
        .route("/matches/:id/abort", post(abort_handler))
        .route("/matches/:id/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .with_state(state)
}

/// CORS for one or more comma-separated origins, `*` allows any
fn cors_layer(client_origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return base.allow_origin(AllowOrigin::any());
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    base.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        active_players: state.match_registry.total_players(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateMatchRequest {
    roster: Vec<RosterEntry>,
    /// Fixed seed for reproducible matches, random when absent
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct CreateMatchResponse {
    match_id: Uuid,
    seed: u64,
    player_count: usize,
}

async fn create_match_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    let seed = req.seed.unwrap_or_else(rand::random);
    let config = MatchConfig {
        loot_count: state.config.loot_count,
        max_players: state.config.max_players,
        ..MatchConfig::default()
    };

    let game = Match::start(Uuid::new_v4(), &req.roster, config, seed)?;
    let handle = state
        .match_registry
        .launch(game, state.runner_settings(), state.stats_sink.clone());

    info!(match_id = %handle.id, players = handle.player_count(), seed, "Match created");

    Ok((
        StatusCode::CREATED,
        Json(CreateMatchResponse {
            match_id: handle.id,
            seed,
            player_count: handle.player_count(),
        }),
    ))
}

async fn snapshot_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<MatchSnapshot>, AppError> {
    let handle = state
        .match_registry
        .get(&match_id)
        .ok_or(AppError::NotFound(format!("match {match_id}")))?;
    Ok(Json(handle.snapshot()))
}

#[derive(Deserialize)]
struct AbortRequest {
    reason: String,
}

#[derive(Serialize)]
struct AbortResponse {
    accepted: bool,
}

async fn abort_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<AbortRequest>,
) -> Result<(StatusCode, Json<AbortResponse>), AppError> {
    let handle = state
        .match_registry
        .get(&match_id)
        .ok_or(AppError::NotFound(format!("match {match_id}")))?;

    if !handle.snapshot().status.is_running() || !handle.request_abort(req.reason) {
        return Err(AppError::Conflict("match is not running".to_string()));
    }

    info!(match_id = %match_id, "Abort requested");
    Ok((StatusCode::ACCEPTED, Json(AbortResponse { accepted: true })))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<StartError> for AppError {
    fn from(err: StartError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
