//! The execution backend seam.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ApprovalRequest, TaskStatus};

/// Outcome of a single backend invocation.
///
/// The adapter never fails across this boundary: timeouts, non-zero
/// exits, and a missing tool all come back as a [`TaskStatus::Failed`]
/// result with the diagnostic in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// `completed`, `failed`, or `needs_approval`.
    pub status: TaskStatus,
    /// Extracted (or raw) output text.
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_request: Option<ApprovalRequest>,
    /// Session token the backend announced in structured output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_session: Option<String>,
}

impl ExecutionResult {
    /// Successful result carrying output text.
    #[must_use]
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Completed,
            output: output.into(),
            error: None,
            approval_request: None,
            backend_session: None,
        }
    }

    /// Failed result carrying a diagnostic message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            output: String::new(),
            error: Some(error.into()),
            approval_request: None,
            backend_session: None,
        }
    }

    /// Result paused on a pending approval.
    #[must_use]
    pub fn needs_approval(output: impl Into<String>, request: ApprovalRequest) -> Self {
        Self {
            status: TaskStatus::NeedsApproval,
            output: output.into(),
            error: None,
            approval_request: Some(request),
            backend_session: None,
        }
    }
}

/// One turn of the external assistant CLI.
///
/// Implementations run the tool with a bounded timeout and capture
/// everything into an [`ExecutionResult`]; the session layer decides
/// when a resume token is passed.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Run one invocation in `working_dir`.
    ///
    /// `resume_token` continues a prior conversation; `None` starts a
    /// fresh one.
    async fn invoke(
        &self,
        working_dir: &Path,
        prompt: &str,
        resume_token: Option<&str>,
    ) -> ExecutionResult;
}
