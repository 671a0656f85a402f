//! Session handlers - start, restart, progress, cancel.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use xfer_core::{ProgressReport, SessionId, StartRequest};

use crate::error::HttpError;
use crate::state::AppState;

/// Body of a start request.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// What to transfer. The original form field name is accepted too.
    #[serde(alias = "magnetURI")]
    pub locator: String,
    /// Optional caller-chosen id. Prefer `PUT /sessions/{id}` for this.
    #[serde(default)]
    pub id: Option<String>,
}

/// Body of a restart request.
#[derive(Debug, Deserialize)]
pub struct LocatorBody {
    /// What to transfer.
    #[serde(alias = "magnetURI")]
    pub locator: String,
}

/// Returned when a session was accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    /// Id the session runs under.
    pub session_id: SessionId,
}

pub(crate) fn parse_id(raw: String) -> Result<SessionId, HttpError> {
    SessionId::parse(raw).map_err(HttpError::from)
}

async fn start_with(
    state: &AppState,
    request: StartRequest,
) -> Result<(StatusCode, Json<StartSessionResponse>), HttpError> {
    let session_id = state.sessions.start_session(request).await?;
    Ok((StatusCode::ACCEPTED, Json(StartSessionResponse { session_id })))
}

/// Start a session (`POST /sessions`).
pub async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), HttpError> {
    let mut request = StartRequest::new(req.locator);
    if let Some(id) = req.id {
        request = request.with_id(parse_id(id)?);
    }
    start_with(&state, request).await
}

/// Start or restart the session `id` (`PUT /sessions/{id}`).
///
/// Any transfer already running under `id` is cancelled and its progress
/// discarded.
pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LocatorBody>,
) -> Result<(StatusCode, Json<StartSessionResponse>), HttpError> {
    let id = parse_id(id)?;
    start_with(&state, StartRequest::new(req.locator).with_id(id)).await
}

/// Progress of a session.
pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProgressReport>, HttpError> {
    let id = parse_id(id)?;
    Ok(Json(state.sessions.get_progress(&id).await?))
}

/// Request cancellation.
///
/// 202 when the signal was delivered, 404 when nothing is running under
/// `id` (including a second cancel).
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let id = parse_id(id)?;
    state.sessions.cancel_session(&id).await?;
    Ok(StatusCode::ACCEPTED)
}
