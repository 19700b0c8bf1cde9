//! User identity, sharing grants, and project registration.
//!
//! Both registries are explicitly constructed, injected instances that
//! own their synchronization. Every mutation rewrites a full JSON
//! snapshot through a [`SnapshotStore`] before it reports success, so a
//! successful call survives a process restart.

pub mod error;
pub mod projects;
pub mod snapshot;
pub mod users;

pub use error::RegistryError;
pub use projects::{Project, ProjectRegistry};
pub use snapshot::{
    JsonSnapshotStore, MemorySnapshotStore, SnapshotError, SnapshotStore, default_state_dir,
};
pub use users::{UserIdentity, UserRegistry};
