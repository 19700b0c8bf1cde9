//! Session manager driving backend invocations.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use agent_relay_core::{
    AgentBackend, ExecutionResult, SessionId, SessionInfo, SessionStatus, TaskStatus,
};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
}

struct SessionEntry {
    info: SessionInfo,
    /// Serializes backend invocations for this session. Resume
    /// semantics assume strict sequencing, so concurrent callers queue
    /// here instead of racing.
    run_lock: Arc<Mutex<()>>,
}

/// Owns the mapping from conversations to backend invocations.
///
/// Sessions live in memory for the life of the process. Status is
/// driven solely by backend results; the invocation count decides
/// whether a resume token is passed, and only ever increases.
pub struct SessionManager<B: AgentBackend> {
    backend: B,
    base_dir: PathBuf,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl<B: AgentBackend> SessionManager<B> {
    /// Create a manager deriving session directories under `base_dir`.
    #[must_use]
    pub fn new(backend: B, base_dir: PathBuf) -> Self {
        Self {
            backend,
            base_dir,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return an existing session or register a fresh one.
    ///
    /// A supplied id that is still alive is returned as-is with its
    /// last-activity touched and nothing else changed. Anything else
    /// allocates a new id: terminated ids are never resurrected, so an
    /// unknown supplied id is not reused either.
    pub async fn obtain(
        &self,
        session_id: Option<SessionId>,
        working_dir: Option<PathBuf>,
    ) -> SessionInfo {
        let mut sessions = self.sessions.write().await;
        if let Some(id) = session_id {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.info.last_activity = Utc::now();
                return entry.info.clone();
            }
        }

        let id = Uuid::new_v4();
        let working_dir = working_dir.unwrap_or_else(|| self.base_dir.join(id.to_string()));
        let now = Utc::now();
        let info = SessionInfo {
            id,
            working_dir,
            status: SessionStatus::Active,
            invocations: 0,
            backend_session: None,
            created_at: now,
            last_activity: now,
        };
        sessions.insert(
            id,
            SessionEntry {
                info: info.clone(),
                run_lock: Arc::new(Mutex::new(())),
            },
        );
        info!(session = %id, working_dir = %info.working_dir.display(), "created session");
        info
    }

    /// Run one prompt in a session.
    ///
    /// The first invocation starts a fresh backend conversation; every
    /// later one passes the session id as the resume token.
    ///
    /// # Errors
    /// `NotFound` when the session id is unknown.
    pub async fn run(
        &self,
        session_id: SessionId,
        prompt: &str,
    ) -> Result<ExecutionResult, SessionError> {
        self.invoke_in_session(session_id, prompt, false).await
    }

    /// Answer a pending approval and continue the conversation.
    ///
    /// Sends `custom_response` when present, else the chosen option id.
    /// Approval resume is never the first invocation, so the resume
    /// token is always passed.
    ///
    /// # Errors
    /// `NotFound` when the session id is unknown.
    pub async fn resume_with_approval(
        &self,
        session_id: SessionId,
        option_id: &str,
        custom_response: Option<&str>,
    ) -> Result<ExecutionResult, SessionError> {
        let prompt = custom_response.unwrap_or(option_id);
        self.invoke_in_session(session_id, prompt, true).await
    }

    async fn invoke_in_session(
        &self,
        session_id: SessionId,
        prompt: &str,
        force_resume: bool,
    ) -> Result<ExecutionResult, SessionError> {
        let run_lock = {
            let sessions = self.sessions.read().await;
            let entry = sessions
                .get(&session_id)
                .ok_or(SessionError::NotFound(session_id))?;
            Arc::clone(&entry.run_lock)
        };
        let _guard = run_lock.lock().await;

        // The session may have been terminated while we queued.
        let (working_dir, resume_token) = {
            let mut sessions = self.sessions.write().await;
            let entry = sessions
                .get_mut(&session_id)
                .ok_or(SessionError::NotFound(session_id))?;
            let resume = force_resume || entry.info.invocations > 0;
            entry.info.invocations += 1;
            entry.info.last_activity = Utc::now();
            (
                entry.info.working_dir.clone(),
                resume.then(|| session_id.to_string()),
            )
        };

        if let Err(err) = tokio::fs::create_dir_all(&working_dir).await {
            let result = ExecutionResult::failure(format!(
                "cannot prepare working directory {}: {err}",
                working_dir.display()
            ));
            self.record_result(session_id, &result).await;
            return Ok(result);
        }

        let result = self
            .backend
            .invoke(&working_dir, prompt, resume_token.as_deref())
            .await;
        self.record_result(session_id, &result).await;
        Ok(result)
    }

    async fn record_result(&self, session_id: SessionId, result: &ExecutionResult) {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(&session_id) else {
            debug!(session = %session_id, "session terminated during invocation");
            return;
        };
        entry.info.status = match result.status {
            TaskStatus::Failed => SessionStatus::Error,
            TaskStatus::NeedsApproval => SessionStatus::AwaitingApproval,
            _ => SessionStatus::Active,
        };
        if let Some(token) = &result.backend_session {
            entry.info.backend_session = Some(token.clone());
        }
        entry.info.last_activity = Utc::now();
    }

    /// Get one session's snapshot.
    pub async fn get(&self, session_id: SessionId) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).map(|entry| entry.info.clone())
    }

    /// All live sessions, newest first.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut result: Vec<SessionInfo> =
            sessions.values().map(|entry| entry.info.clone()).collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Terminate a session; returns whether it existed.
    ///
    /// Destruction is irreversible and the id is never reused.
    pub async fn terminate(&self, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let existed = sessions.remove(&session_id).is_some();
        if existed {
            info!(session = %session_id, "terminated session");
        }
        existed
    }

    /// Terminate sessions idle past the age threshold; returns how many.
    pub async fn sweep_stale(&self, max_age_hours: u64) -> usize {
        let age = chrono::Duration::hours(i64::try_from(max_age_hours).unwrap_or(i64::MAX));
        let cutoff = Utc::now() - age;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.info.last_activity > cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            info!(count = removed, max_age_hours, "swept stale sessions");
        }
        removed
    }
}
