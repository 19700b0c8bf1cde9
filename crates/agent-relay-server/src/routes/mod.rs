//! HTTP route handlers.

pub mod health;
pub mod projects;
pub mod sessions;
pub mod tasks;
pub mod users;

use agent_relay_registry::RegistryError;
use agent_relay_routing::{ForwardError, RoutingError};
use axum::{
    Json, Router,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Assemble the full API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/v1/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route("/api/v1/tasks/{id}", get(tasks::get_task))
        .route("/api/v1/tasks/{id}/approval", post(tasks::submit_approval))
        .route("/api/v1/sessions", get(sessions::list_sessions))
        .route("/api/v1/sessions/{id}", delete(sessions::terminate_session))
        .route("/api/v1/users/register", post(users::register_runner))
        .route("/api/v1/users/{id}", get(users::get_user))
        .route("/api/v1/users/{id}/runner", delete(users::unregister_runner))
        .route(
            "/api/v1/users/{id}/cluster",
            post(users::enable_cluster).delete(users::disable_cluster),
        )
        .route("/api/v1/users/{id}/mode", put(users::set_default_mode))
        .route("/api/v1/users/{id}/accessible", get(users::list_accessible))
        .route(
            "/api/v1/users/{id}/shares",
            post(users::grant_share).get(users::list_shares),
        )
        .route(
            "/api/v1/users/{id}/shares/{grantee}",
            delete(users::revoke_share),
        )
        .route(
            "/api/v1/projects",
            post(projects::add_project).get(projects::list_projects),
        )
        .route("/api/v1/projects/{name}", delete(projects::remove_project))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Standard `{"error": ...}` body.
pub(crate) fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "error": message.into() }))
}

pub(crate) fn registry_failure(err: RegistryError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        RegistryError::UserNotFound(_)
        | RegistryError::ProjectNotFound(_)
        | RegistryError::GrantNotFound { .. } => StatusCode::NOT_FOUND,
        RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistryError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error_body(err.to_string()))
}

pub(crate) fn routing_failure(err: RoutingError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        RoutingError::Rejected(_) | RoutingError::ClusterUnavailable => StatusCode::BAD_REQUEST,
        RoutingError::Remote(remote) => match remote {
            ForwardError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
            ForwardError::Unreachable { .. }
            | ForwardError::RunnerStatus { .. }
            | ForwardError::Transport(_) => StatusCode::BAD_GATEWAY,
        },
    };
    (status, error_body(err.to_string()))
}
