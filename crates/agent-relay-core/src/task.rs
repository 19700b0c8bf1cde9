//! Task lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SessionId;

/// Task identifier.
pub type TaskId = Uuid;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, execution not yet started.
    Pending,
    /// A backend invocation is in flight.
    Running,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished with an error. Terminal.
    Failed,
    /// Waiting for a human to pick an approval option.
    NeedsApproval,
}

impl TaskStatus {
    /// True once the task can never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// The machine is monotonic apart from the approval resume cycle:
    /// `pending -> running -> completed | failed | needs_approval`, and
    /// `needs_approval -> running` when an approval is submitted. A
    /// same-state update is always allowed so partial field updates do
    /// not have to omit the status.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        self == next
            || matches!(
                (self, next),
                (Self::Pending, Self::Running | Self::Failed)
                    | (Self::Running, Self::Completed | Self::Failed | Self::NeedsApproval)
                    | (Self::NeedsApproval, Self::Running)
            )
    }
}

/// One selectable choice in an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOption {
    /// Stable identifier submitted back on selection.
    pub id: String,
    /// Short human-readable label.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A backend request for human input before it can continue.
///
/// Attached to a task only while its status is
/// [`TaskStatus::NeedsApproval`]; cleared when the task resumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Action the backend wants to take.
    pub action: String,
    /// Human-readable explanation of the action.
    pub description: String,
    /// Ordered options to choose from.
    pub options: Vec<ApprovalOption>,
}

/// One externally visible unit of work.
///
/// A task records a single request's progress for client polling,
/// independent of how many backend invocations the owning session has
/// performed. Tasks live in memory only and do not survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier, generated at creation.
    pub id: TaskId,
    /// Session this task executed in.
    pub session_id: SessionId,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Accumulated output text.
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_request: Option<ApprovalRequest>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
}
