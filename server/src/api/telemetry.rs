use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use super::AppState;
use crate::service::{CaptureResult, FreshSession};
use crate::telemetry::{SessionSummary, TelemetrySnapshot};

/// Query parameters for history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub session_id: Option<String>,
}

/// Optional body for starting a session.
#[derive(Debug, Default, Deserialize)]
pub struct FreshSessionRequest {
    #[serde(default)]
    pub clear: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared_count: u64,
}

/// POST /api/v1/telemetry/capture — take a snapshot now.
pub async fn capture(State(state): State<AppState>) -> Json<CaptureResult> {
    Json(state.service.capture_snapshot().await)
}

/// GET /api/v1/telemetry/history — snapshots of a session, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TelemetrySnapshot>>, AppError> {
    let history = state
        .service
        .history(query.limit, query.session_id.as_deref())
        .await?;
    Ok(Json(history))
}

/// POST /api/v1/telemetry/sessions — start a fresh session.
pub async fn start_fresh(
    State(state): State<AppState>,
    body: Option<Json<FreshSessionRequest>>,
) -> Json<FreshSession> {
    let Json(request) = body.unwrap_or_default();
    Json(state.service.start_fresh_session(request.clear).await)
}

/// GET /api/v1/telemetry/sessions — stored sessions, newest first.
pub async fn sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.service.sessions().await)
}

/// DELETE /api/v1/telemetry — remove all telemetry of every session.
pub async fn clear_all(State(state): State<AppState>) -> Json<ClearedResponse> {
    Json(ClearedResponse {
        cleared_count: state.service.clear_all().await,
    })
}
