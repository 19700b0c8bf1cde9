//! Session and task lifecycle for agent-relay.
//!
//! Provides:
//! - `SessionManager` - sessions and their backend invocations
//! - `TaskStore` - task records with lifecycle enforcement

pub mod manager;
pub mod store;

pub use manager::{SessionError, SessionManager};
pub use store::{TaskPatch, TaskStore, TaskStoreError};
