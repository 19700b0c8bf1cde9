//! Shared data model for the agent relay.
//!
//! Everything the workspace crates exchange lives here:
//! - task and session lifecycle types with their status machines
//! - the closed [`ExecutionMode`] enum
//! - approval payloads and the wire request shapes
//! - the [`AgentBackend`] seam the session layer drives

pub mod backend;
pub mod mode;
pub mod session;
pub mod task;
pub mod wire;

pub use backend::{AgentBackend, ExecutionResult};
pub use mode::ExecutionMode;
pub use session::{SessionId, SessionInfo, SessionStatus};
pub use task::{ApprovalOption, ApprovalRequest, Task, TaskId, TaskStatus};
pub use wire::{ApprovalSubmission, CreateTaskRequest};

/// Opaque, caller-assigned user identifier.
pub type UserId = String;
