use super::state::AppState;
use crate::error::SessionError;
use crate::protocol::ClientCommand;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandAccepted {
    pub accepted: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    fn from_error(error: &SessionError) -> Json<Self> {
        Json(Self {
            error: error.to_string(),
            code: error.code(),
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /state
/// Snapshot of the current session, duration computed at request time
pub async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            warn!("State query failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::from_error(&e)).into_response()
        }
    }
}

/// POST /commands
/// Queue one command. The outcome reaches clients through state updates.
pub async fn post_command(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let command: ClientCommand = match serde_json::from_slice(&body) {
        Ok(command) => command,
        Err(e) => {
            let error = SessionError::Protocol(format!("Malformed command: {}", e));
            warn!("{}", error);
            return (StatusCode::BAD_REQUEST, ErrorResponse::from_error(&error)).into_response();
        }
    };

    let name = command.name();
    info!("Received {} over HTTP", name);

    match state.coordinator.dispatch(command, None) {
        Ok(()) => (StatusCode::ACCEPTED, Json(CommandAccepted { accepted: name })).into_response(),
        Err(e) => {
            warn!("Rejected {}: {}", name, e);
            (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::from_error(&e)).into_response()
        }
    }
}
