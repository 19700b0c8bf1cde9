//! Session inspection and teardown.

use agent_relay_core::{SessionId, SessionInfo};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use super::error_body;
use crate::state::AppState;

/// List sessions on this runner, newest first.
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list().await)
}

/// Drop a session. Its task history stays queryable.
pub async fn terminate_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    if state.sessions.terminate(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            error_body(format!("Session {id} not found")),
        ))
    }
}
