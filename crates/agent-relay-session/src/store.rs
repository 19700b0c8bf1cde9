//! In-memory task tracking.

use std::collections::HashMap;

use agent_relay_core::{
    ApprovalRequest, ExecutionResult, SessionId, Task, TaskId, TaskStatus,
};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Task store error.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),
    #[error("Task {id} is {status:?} and can no longer change")]
    Terminal { id: TaskId, status: TaskStatus },
    #[error("Task {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Partial update applied to a task.
///
/// Only `Some` fields are written. Setting a status other than
/// `needs_approval` clears any attached approval request, so a resumed
/// task cannot keep a stale one.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub approval_request: Option<ApprovalRequest>,
}

impl TaskPatch {
    /// Patch recording one backend invocation's outcome.
    #[must_use]
    pub fn from_result(result: &ExecutionResult) -> Self {
        Self {
            status: Some(result.status),
            output: Some(result.output.clone()),
            error: result.error.clone(),
            approval_request: result.approval_request.clone(),
        }
    }

    /// Patch that only moves the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// In-memory task tracker.
///
/// One record per externally visible request, for client polling.
/// Data is lost on restart; durability is the registries' concern,
/// not this store's.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending task owned by `session_id`.
    pub async fn create(&self, session_id: SessionId) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            session_id,
            status: TaskStatus::Pending,
            output: String::new(),
            error: None,
            approval_request: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().await.insert(task.id, task.clone());
        task
    }

    /// Get a task by id.
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Apply a partial update, stamping `updated_at`.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Terminal` when the task already
    /// completed or failed, `InvalidTransition` when the patched status
    /// is not reachable from the current one.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task, TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;

        if task.status.is_terminal() {
            return Err(TaskStoreError::Terminal {
                id,
                status: task.status,
            });
        }
        if let Some(next) = patch.status {
            if !task.status.can_advance_to(next) {
                return Err(TaskStoreError::InvalidTransition {
                    id,
                    from: task.status,
                    to: next,
                });
            }
            task.status = next;
            if next != TaskStatus::NeedsApproval {
                task.approval_request = None;
            }
        }
        if let Some(output) = patch.output {
            task.output = output;
        }
        if let Some(error) = patch.error {
            task.error = Some(error);
        }
        if let Some(request) = patch.approval_request {
            task.approval_request = Some(request);
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Tasks, newest first, optionally filtered by session.
    pub async fn list(&self, session_id: Option<SessionId>) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut result: Vec<Task> = tasks
            .values()
            .filter(|task| session_id.is_none_or(|id| task.session_id == id))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Remove a task; returns whether it existed.
    pub async fn delete(&self, id: TaskId) -> bool {
        self.tasks.write().await.remove(&id).is_some()
    }
}
