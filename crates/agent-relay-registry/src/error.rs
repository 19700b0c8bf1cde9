//! Registry error types.

use agent_relay_core::UserId;
use thiserror::Error;

use crate::SnapshotError;

/// Errors surfaced by the user and project registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("User '{0}' is not registered")]
    UserNotFound(UserId),
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),
    #[error("User '{owner}' is not sharing with '{grantee}'")]
    GrantNotFound { owner: UserId, grantee: UserId },
    #[error("{0}")]
    Validation(String),
    #[error("failed to persist registry: {0}")]
    Persist(#[from] SnapshotError),
}
