//! Task endpoints: creation, polling, approval.

use std::path::PathBuf;

use agent_relay_core::{
    ApprovalSubmission, CreateTaskRequest, SessionId, Task, TaskId, TaskStatus, UserId,
};
use agent_relay_session::{TaskPatch, TaskStoreError};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{error_body, routing_failure};
use crate::{config::Role, state::AppState};

#[derive(Deserialize)]
pub struct IdentityQuery {
    pub requester_id: Option<UserId>,
}

#[derive(Deserialize)]
pub struct ListTasksQuery {
    pub session_id: Option<SessionId>,
}

/// Create and execute a task.
///
/// A coordinator resolves the route and forwards; a runner executes
/// directly. Backend failures land in the task record, so the caller
/// still receives a task snapshot.
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, Json<Value>)> {
    if state.config.role == Role::Coordinator {
        let Some(requester) = request.requester_id.as_deref() else {
            return Err((
                StatusCode::BAD_REQUEST,
                error_body("requester_id is required in coordinator mode"),
            ));
        };
        let task = state
            .router
            .route_task(requester, &request)
            .await
            .map_err(routing_failure)?;
        return Ok((StatusCode::CREATED, Json(task)));
    }

    let working_dir = resolve_working_dir(&state, &request).await?;
    let session = state.sessions.obtain(request.session_id, working_dir).await;
    let task = state.tasks.create(session.id).await;
    info!(task = %task.id, session = %session.id, "executing task");

    mark_running(&state, task.id).await?;
    let result = state
        .sessions
        .run(session.id, &request.prompt)
        .await
        .map_err(|err| (StatusCode::NOT_FOUND, error_body(err.to_string())))?;
    let task = state
        .tasks
        .update(task.id, TaskPatch::from_result(&result))
        .await
        .map_err(task_failure)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Fetch one task. A coordinator forwards the lookup to the
/// requester's runner.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    if state.config.role == Role::Coordinator {
        let Some(requester) = query.requester_id.as_deref() else {
            return Err((
                StatusCode::BAD_REQUEST,
                error_body("requester_id query parameter is required in coordinator mode"),
            ));
        };
        let task = state
            .router
            .route_get_task(requester, id)
            .await
            .map_err(routing_failure)?;
        return Ok(Json(task));
    }

    match state.tasks.get(id).await {
        Some(task) => Ok(Json(task)),
        None => Err((
            StatusCode::NOT_FOUND,
            error_body(format!("Task {id} not found")),
        )),
    }
}

/// List local tasks, newest first.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Json<Vec<Task>> {
    Json(state.tasks.list(query.session_id).await)
}

/// Answer a pending approval and continue the task.
///
/// Rejected with 400 unless the task is currently awaiting approval;
/// the task is not touched in that case.
pub async fn submit_approval(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Query(query): Query<IdentityQuery>,
    Json(submission): Json<ApprovalSubmission>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    if state.config.role == Role::Coordinator {
        let Some(requester) = query.requester_id.as_deref() else {
            return Err((
                StatusCode::BAD_REQUEST,
                error_body("requester_id query parameter is required in coordinator mode"),
            ));
        };
        let task = state
            .router
            .route_approval(requester, id, &submission)
            .await
            .map_err(routing_failure)?;
        return Ok(Json(task));
    }

    let Some(task) = state.tasks.get(id).await else {
        return Err((
            StatusCode::NOT_FOUND,
            error_body(format!("Task {id} not found")),
        ));
    };
    if task.status != TaskStatus::NeedsApproval {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body(format!("Task {id} is not awaiting approval")),
        ));
    }

    info!(task = %id, option = %submission.option_id, "resuming task after approval");
    mark_running(&state, id).await?;
    let result = state
        .sessions
        .resume_with_approval(
            task.session_id,
            &submission.option_id,
            submission.custom_response.as_deref(),
        )
        .await
        .map_err(|err| (StatusCode::NOT_FOUND, error_body(err.to_string())))?;

    let mut patch = TaskPatch::from_result(&result);
    patch.output = Some(format!("{}\n{}", task.output, result.output));
    let updated = state.tasks.update(id, patch).await.map_err(task_failure)?;
    Ok(Json(updated))
}

async fn mark_running(state: &AppState, id: TaskId) -> Result<(), (StatusCode, Json<Value>)> {
    state
        .tasks
        .update(id, TaskPatch::status(TaskStatus::Running))
        .await
        .map_err(task_failure)?;
    Ok(())
}

fn task_failure(err: TaskStoreError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        TaskStoreError::NotFound(_) => StatusCode::NOT_FOUND,
        TaskStoreError::Terminal { .. } | TaskStoreError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
    };
    (status, error_body(err.to_string()))
}

/// Resolve where a task should run on this machine.
///
/// A named project wins over an explicit directory. Both are checked
/// against the allowed roots, since the allow-list may have changed
/// after a project was registered.
async fn resolve_working_dir(
    state: &AppState,
    request: &CreateTaskRequest,
) -> Result<Option<PathBuf>, (StatusCode, Json<Value>)> {
    if let Some(name) = request.project.as_deref() {
        let Some(owner) = request.requester_id.as_deref() else {
            return Err((
                StatusCode::BAD_REQUEST,
                error_body("requester_id is required when naming a project"),
            ));
        };
        let Some(project) = state.projects.get(owner, name).await else {
            return Err((
                StatusCode::NOT_FOUND,
                error_body(format!("Project '{name}' not found")),
            ));
        };
        if !state.projects.path_allowed(&project.path) {
            return Err((
                StatusCode::FORBIDDEN,
                error_body(
                    "Project path is no longer within the allowed roots. Re-register the project.",
                ),
            ));
        }
        return Ok(Some(project.path));
    }

    if let Some(dir) = &request.working_dir {
        if !state.projects.path_allowed(dir) {
            return Err((
                StatusCode::FORBIDDEN,
                error_body(format!(
                    "Working directory '{}' is outside the allowed roots",
                    dir.display()
                )),
            ));
        }
        return Ok(Some(dir.clone()));
    }

    Ok(None)
}
