//! Shared application state.

use std::{sync::Arc, time::Instant};

use agent_relay_executor::{CliBackend, CommandBuilder};
use agent_relay_registry::{JsonSnapshotStore, ProjectRegistry, UserRegistry};
use agent_relay_routing::TaskRouter;
use agent_relay_session::{SessionManager, TaskStore};

use crate::config::ServerConfig;

/// Everything the route handlers share.
///
/// Registries and stores are constructed here and injected; handlers
/// never reach for globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub users: Arc<UserRegistry>,
    pub projects: Arc<ProjectRegistry>,
    pub sessions: Arc<SessionManager<CliBackend>>,
    pub tasks: Arc<TaskStore>,
    pub router: Arc<TaskRouter>,
    started_at: Instant,
}

impl AppState {
    /// Wire up registries, stores, and the router from config.
    ///
    /// # Errors
    /// Fails when the state directory cannot be created or a registry
    /// snapshot exists but cannot be read.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.state_dir)?;

        let users = Arc::new(UserRegistry::open(JsonSnapshotStore::new(
            config.state_dir.join("users.json"),
        ))?);
        let projects = Arc::new(ProjectRegistry::open(
            JsonSnapshotStore::new(config.state_dir.join("projects.json")),
            config.allowed_project_dirs.clone(),
        )?);

        let backend = CliBackend::new(CommandBuilder::new(&config.backend_command))
            .with_timeout(config.backend_timeout);
        let sessions = Arc::new(SessionManager::new(backend, config.working_dir.clone()));
        let tasks = Arc::new(TaskStore::new());
        let router = Arc::new(TaskRouter::new(Arc::clone(&users)));

        Ok(Self {
            config: Arc::new(config),
            users,
            projects,
            sessions,
            tasks,
            router,
            started_at: Instant::now(),
        })
    }

    /// Seconds since this state was built.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
