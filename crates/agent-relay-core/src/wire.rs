//! Request shapes shared between the API surface and the forwarder.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ExecutionMode, SessionId, UserId};

/// Incoming task creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Natural-language instruction for the backend.
    pub prompt: String,
    /// Continue an existing conversation when supplied and known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Named project whose directory the task runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Explicit working directory override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Who is asking. Required by a coordinator, ignored by a runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<UserId>,
    /// Act through this user's runner instead of the requester's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<UserId>,
    /// Explicit mode override; defaults to the acting identity's mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
}

impl CreateTaskRequest {
    /// The reduced payload sent downstream to a runner.
    ///
    /// Identity and mode are resolved by the coordinator and must not
    /// leak to the runner, which executes whatever it receives.
    #[must_use]
    pub fn forwarded(&self) -> Self {
        Self {
            requester_id: None,
            target_user_id: None,
            mode: None,
            ..self.clone()
        }
    }
}

/// Response to a pending approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSubmission {
    /// Id of the chosen [`crate::ApprovalOption`].
    pub option_id: String,
    /// Free-text answer sent instead of the option id when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn full_request() -> CreateTaskRequest {
        CreateTaskRequest {
            prompt: "fix the tests".into(),
            session_id: Some(Uuid::new_v4()),
            project: Some("api".into()),
            working_dir: Some(PathBuf::from("/srv/api")),
            requester_id: Some("u-123".into()),
            target_user_id: Some("u-456".into()),
            mode: Some(ExecutionMode::Local),
        }
    }

    #[test]
    fn test_forwarded_strips_identity_and_mode() {
        let reduced = full_request().forwarded();
        let json = serde_json::to_string(&reduced).unwrap();

        assert!(!json.contains("requester_id"));
        assert!(!json.contains("target_user_id"));
        assert!(!json.contains("mode"));
        assert!(json.contains("session_id"));
        assert!(json.contains("working_dir"));
        assert!(json.contains("fix the tests"));
    }

    #[test]
    fn test_minimal_request_parses() {
        let request: CreateTaskRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(request.prompt, "hi");
        assert!(request.session_id.is_none());
        assert!(request.mode.is_none());
    }

    #[test]
    fn test_submission_custom_response_omitted() {
        let submission = ApprovalSubmission {
            option_id: "approve".into(),
            custom_response: None,
        };
        let json = serde_json::to_string(&submission).unwrap();
        assert!(!json.contains("custom_response"));
    }
}
