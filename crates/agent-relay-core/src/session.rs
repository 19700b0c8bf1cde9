//! Session lifecycle types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session identifier.
pub type SessionId = Uuid;

/// Session status, driven solely by backend results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Healthy; the last invocation (if any) succeeded.
    Active,
    /// The last invocation stopped on a pending approval.
    AwaitingApproval,
    /// The last invocation failed.
    Error,
    /// Explicitly terminated; the id will not be reused.
    Terminated,
}

/// Snapshot of one conversation's state.
///
/// A session is the unit of conversational continuity: an ordered
/// sequence of backend invocations sharing context via a resume token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Stable identifier for the life of the conversation.
    pub id: SessionId,
    /// Directory backend invocations run in.
    pub working_dir: PathBuf,
    /// Current status.
    pub status: SessionStatus,
    /// Number of backend invocations recorded. Only ever increases.
    pub invocations: u64,
    /// Session token the backend last announced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_session: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Touched on every obtain and invocation.
    pub last_activity: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::AwaitingApproval).unwrap(),
            "\"awaiting_approval\""
        );
        assert_eq!(
            serde_json::from_str::<SessionStatus>("\"terminated\"").unwrap(),
            SessionStatus::Terminated
        );
    }

    #[test]
    fn test_backend_session_omitted_when_absent() {
        let info = SessionInfo {
            id: Uuid::new_v4(),
            working_dir: PathBuf::from("/tmp/s"),
            status: SessionStatus::Active,
            invocations: 0,
            backend_session: None,
            created_at: Utc::now(),
            last_activity: Utc::now(),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("backend_session"));
    }
}
