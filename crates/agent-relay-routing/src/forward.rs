//! HTTP client forwarding requests to a user's runner.

use std::time::Duration;

use agent_relay_core::{ApprovalSubmission, CreateTaskRequest, Task, TaskId};
use reqwest::StatusCode;

/// Runner calls share the backend's generous ceiling: a forwarded task
/// blocks on the downstream backend invocation.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(300);

/// Forwarding failure.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Cannot connect to your runner at {url}. Is it running?")]
    Unreachable { url: String },
    #[error("Runner error: {body}")]
    RunnerStatus { body: String },
    #[error("Task {task_id} not found on your runner")]
    TaskNotFound { task_id: TaskId },
    #[error("Failed to reach runner: {0}")]
    Transport(String),
}

/// Client for the runner-side task API.
///
/// Every call attaches `Authorization: Bearer <token>` when the target
/// has a token configured and relays the runner's task snapshot back
/// unchanged.
pub struct ForwardClient {
    client: reqwest::Client,
}

impl ForwardClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(FORWARD_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Submit a task for execution on the runner.
    ///
    /// # Errors
    /// Connectivity, HTTP status, and payload failures per [`ForwardError`].
    pub async fn forward_task(
        &self,
        base_url: &str,
        token: Option<&str>,
        payload: &CreateTaskRequest,
    ) -> Result<Task, ForwardError> {
        let url = format!("{}/api/v1/tasks", base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(payload);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| send_failure(base_url, &err))?;
        read_task(response).await
    }

    /// Fetch a task snapshot from the runner.
    ///
    /// # Errors
    /// As [`Self::forward_task`], plus `TaskNotFound` on a runner 404.
    pub async fn forward_get_task(
        &self,
        base_url: &str,
        token: Option<&str>,
        task_id: TaskId,
    ) -> Result<Task, ForwardError> {
        let url = format!("{}/api/v1/tasks/{task_id}", base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| send_failure(base_url, &err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ForwardError::TaskNotFound { task_id });
        }
        read_task(response).await
    }

    /// Submit an approval response for a waiting task on the runner.
    ///
    /// # Errors
    /// Connectivity, HTTP status, and payload failures per [`ForwardError`].
    pub async fn forward_approval(
        &self,
        base_url: &str,
        token: Option<&str>,
        task_id: TaskId,
        submission: &ApprovalSubmission,
    ) -> Result<Task, ForwardError> {
        let url = format!(
            "{}/api/v1/tasks/{task_id}/approval",
            base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).json(submission);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| send_failure(base_url, &err))?;
        read_task(response).await
    }
}

impl Default for ForwardClient {
    fn default() -> Self {
        Self::new()
    }
}

fn send_failure(url: &str, err: &reqwest::Error) -> ForwardError {
    if err.is_connect() {
        ForwardError::Unreachable {
            url: url.to_string(),
        }
    } else {
        ForwardError::Transport(err.to_string())
    }
}

async fn read_task(response: reqwest::Response) -> Result<Task, ForwardError> {
    if !response.status().is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unreadable response body".to_string());
        // Runner errors come back as {"error": ...}; surface the
        // message itself when the body parses.
        let body = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("error")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string)
            })
            .unwrap_or(body);
        return Err(ForwardError::RunnerStatus { body });
    }
    response
        .json()
        .await
        .map_err(|err| ForwardError::Transport(format!("invalid task payload: {err}")))
}
