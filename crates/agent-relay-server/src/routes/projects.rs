//! Project registry endpoints.

use std::path::PathBuf;

use agent_relay_core::UserId;
use agent_relay_registry::Project;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use super::{error_body, registry_failure};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddProjectRequest {
    pub user_id: UserId,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub user_id: Option<UserId>,
}

/// Register a project directory for task execution.
pub async fn add_project(
    State(state): State<AppState>,
    Json(request): Json<AddProjectRequest>,
) -> Result<(StatusCode, Json<Project>), (StatusCode, Json<Value>)> {
    let project = state
        .projects
        .add(
            &request.user_id,
            &request.name,
            &request.path,
            request.description,
        )
        .await
        .map_err(registry_failure)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Project>>, (StatusCode, Json<Value>)> {
    let Some(owner) = query.user_id.as_deref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("user_id query parameter is required"),
        ));
    };
    Ok(Json(state.projects.list(owner).await))
}

pub async fn remove_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let Some(owner) = query.user_id.as_deref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("user_id query parameter is required"),
        ));
    };
    if state.projects.remove(owner, &name).await.map_err(registry_failure)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            error_body(format!("Project '{name}' not found")),
        ))
    }
}
