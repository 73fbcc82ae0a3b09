//! Recording control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting, stopping and toggling a recording (POST /start, /stop, /toggle)
//! - Getting the session status (GET /status)

use crate::api::error::{ApiError, ApiResult};
use crate::session::StatusHandle;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingAction {
    Start,
    Stop,
    Toggle,
}

impl RecordingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Toggle => "toggle",
        }
    }
}

/// Sent to the service loop, which owns the chat machine.
pub struct ApiCommand {
    pub action: RecordingAction,
    pub reply: oneshot::Sender<ApiResult<()>>,
}

#[derive(Clone)]
pub struct RecordingState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub status: StatusHandle,
}

/// Creates the recording router with all recording-related endpoints.
pub fn router(state: RecordingState) -> Router {
    Router::new()
        .route("/start", post(start_recording))
        .route("/stop", post(stop_recording))
        .route("/toggle", post(toggle_recording))
        .route("/status", get(recording_status))
        .with_state(state)
}

async fn start_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    dispatch(&state, RecordingAction::Start).await
}

async fn stop_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    dispatch(&state, RecordingAction::Stop).await
}

async fn toggle_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    dispatch(&state, RecordingAction::Toggle).await
}

async fn dispatch(state: &RecordingState, action: RecordingAction) -> ApiResult<Json<Value>> {
    info!("{} command received via API", action.as_str());

    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .tx
        .send(ApiCommand {
            action,
            reply: reply_tx,
        })
        .await
        .map_err(|e| {
            error!("Failed to send {} command: {}", action.as_str(), e);
            ApiError::internal("Service loop is not running")
        })?;

    reply_rx
        .await
        .map_err(|_| ApiError::internal("Service loop dropped the request"))??;

    let status = state.status.get().await;
    Ok(Json(json!({
        "success": true,
        "phase": status.phase.as_str(),
        "text": status.text,
    })))
}

/// Gets the current session status, including the reply player's source.
async fn recording_status(State(state): State<RecordingState>) -> Json<Value> {
    let status = state.status.get().await;

    Json(json!({
        "phase": status.phase.as_str(),
        "recording": status.phase == crate::session::SessionPhase::Recording,
        "text": status.text,
        "last_alert": status.last_alert,
        "last_error": status.last_error,
        "player_source": status.player_source.map(|s| s.url),
    }))
}
