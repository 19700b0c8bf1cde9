//! Identity endpoints: runner registration, cluster eligibility,
//! default mode, and sharing grants.

use agent_relay_core::{ExecutionMode, UserId};
use agent_relay_registry::UserIdentity;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{error_body, registry_failure};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRunnerRequest {
    pub user_id: UserId,
    pub display_name: String,
    pub runner_url: String,
    #[serde(default)]
    pub runner_token: Option<String>,
}

#[derive(Deserialize)]
pub struct EnableClusterRequest {
    pub display_name: String,
    #[serde(default)]
    pub storage_path: Option<String>,
}

#[derive(Deserialize)]
pub struct SetModeRequest {
    pub mode: ExecutionMode,
}

#[derive(Deserialize)]
pub struct GrantShareRequest {
    pub grantee_id: UserId,
}

/// Register (or re-point) the caller's runner URL.
pub async fn register_runner(
    State(state): State<AppState>,
    Json(request): Json<RegisterRunnerRequest>,
) -> Result<(StatusCode, Json<UserIdentity>), (StatusCode, Json<Value>)> {
    let identity = state
        .users
        .register_runner(
            &request.user_id,
            &request.display_name,
            &request.runner_url,
            request.runner_token,
        )
        .await
        .map_err(registry_failure)?;
    info!(user = %identity.id, url = %request.runner_url, "runner registered");
    Ok((StatusCode::CREATED, Json(identity)))
}

pub async fn unregister_runner(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .users
        .unregister_runner(&id)
        .await
        .map_err(registry_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark the user as cluster-eligible, creating the identity if needed.
pub async fn enable_cluster(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(request): Json<EnableClusterRequest>,
) -> Result<(StatusCode, Json<UserIdentity>), (StatusCode, Json<Value>)> {
    let identity = state
        .users
        .enable_cluster(&id, &request.display_name, request.storage_path)
        .await
        .map_err(registry_failure)?;
    Ok((StatusCode::CREATED, Json(identity)))
}

pub async fn disable_cluster(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .users
        .disable_cluster(&id)
        .await
        .map_err(registry_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default_mode(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(request): Json<SetModeRequest>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .users
        .set_default_mode(&id, request.mode)
        .await
        .map_err(registry_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserIdentity>, (StatusCode, Json<Value>)> {
    match state.users.resolve(&id).await {
        Some(identity) => Ok(Json(identity)),
        None => Err((
            StatusCode::NOT_FOUND,
            error_body(format!("User '{id}' is not registered")),
        )),
    }
}

/// Identities the user may act through: their own plus every owner
/// who has shared with them.
pub async fn list_accessible(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Json<Vec<UserIdentity>> {
    Json(state.users.list_accessible(&id).await)
}

pub async fn grant_share(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(request): Json<GrantShareRequest>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .users
        .grant_access(&id, &request.grantee_id)
        .await
        .map_err(registry_failure)?;
    info!(owner = %id, grantee = %request.grantee_id, "runner access granted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_shares(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Vec<UserId>>, (StatusCode, Json<Value>)> {
    let grantees = state
        .users
        .shared_with(&id)
        .await
        .map_err(registry_failure)?;
    Ok(Json(grantees))
}

pub async fn revoke_share(
    State(state): State<AppState>,
    Path((id, grantee)): Path<(UserId, UserId)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .users
        .revoke_access(&id, &grantee)
        .await
        .map_err(registry_failure)?;
    info!(owner = %id, grantee = %grantee, "runner access revoked");
    Ok(StatusCode::NO_CONTENT)
}
