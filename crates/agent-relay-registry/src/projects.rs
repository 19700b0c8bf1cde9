//! Named, path-validated project directories.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use agent_relay_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::{RegistryError, SnapshotStore};

/// A per-user named working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Name as the owner spelled it.
    pub name: String,
    /// Resolved absolute path.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

type ProjectMap = HashMap<String, Project>;

/// Registry of project directories, keyed per owner.
///
/// Paths are validated on registration: they must exist, be
/// directories, and fall under one of the allowed roots. An empty
/// allow-list permits any path.
pub struct ProjectRegistry {
    projects: RwLock<ProjectMap>,
    store: Box<dyn SnapshotStore<ProjectMap>>,
    allowed_roots: Vec<PathBuf>,
}

fn project_key(owner_id: &str, name: &str) -> String {
    format!("{owner_id}:{}", name.trim().to_lowercase())
}

impl ProjectRegistry {
    /// Open the registry, loading the last snapshot if one exists.
    ///
    /// # Errors
    /// Returns an error when the snapshot exists but cannot be read.
    pub fn open(
        store: impl SnapshotStore<ProjectMap> + 'static,
        allowed_roots: Vec<PathBuf>,
    ) -> Result<Self, RegistryError> {
        let projects = store.load()?.unwrap_or_default();
        Ok(Self {
            projects: RwLock::new(projects),
            store: Box::new(store),
            allowed_roots,
        })
    }

    /// Whether `path` falls under one of the allowed roots.
    #[must_use]
    pub fn path_allowed(&self, path: &Path) -> bool {
        if self.allowed_roots.is_empty() {
            return true;
        }
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.allowed_roots.iter().any(|root| {
            let root = root.canonicalize().unwrap_or_else(|_| root.clone());
            resolved.starts_with(&root)
        })
    }

    /// Register a project directory for `owner_id`.
    ///
    /// # Errors
    /// `Validation` for a duplicate name, a path that does not exist or
    /// is not a directory, or a path outside the allowed roots; or a
    /// persistence error.
    pub async fn add(
        &self,
        owner_id: &str,
        name: &str,
        path: &Path,
        description: Option<String>,
    ) -> Result<Project, RegistryError> {
        let mut projects = self.projects.write().await;
        let key = project_key(owner_id, name);
        if projects.contains_key(&key) {
            return Err(RegistryError::Validation(format!(
                "Project '{name}' already exists for your account"
            )));
        }
        if !path.exists() {
            return Err(RegistryError::Validation(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(RegistryError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }
        if !self.path_allowed(path) {
            let roots: Vec<String> = self
                .allowed_roots
                .iter()
                .map(|root| root.display().to_string())
                .collect();
            return Err(RegistryError::Validation(format!(
                "Path '{}' is outside the allowed project roots: {}",
                path.display(),
                roots.join(", ")
            )));
        }
        let resolved = path
            .canonicalize()
            .map_err(|err| RegistryError::Validation(format!("cannot resolve path: {err}")))?;

        let project = Project {
            name: name.trim().to_string(),
            path: resolved,
            description,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };
        projects.insert(key, project.clone());
        self.store.save(&projects)?;
        info!(owner = %owner_id, project = %project.name, "registered project");
        Ok(project)
    }

    /// Look up a project by name, case-insensitively.
    pub async fn get(&self, owner_id: &str, name: &str) -> Option<Project> {
        let projects = self.projects.read().await;
        projects.get(&project_key(owner_id, name)).cloned()
    }

    /// The owner's projects, ordered by name.
    pub async fn list(&self, owner_id: &str) -> Vec<Project> {
        let projects = self.projects.read().await;
        let mut owned: Vec<Project> = projects
            .values()
            .filter(|project| project.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.name.cmp(&b.name));
        owned
    }

    /// Remove a project; returns whether it existed.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be persisted.
    pub async fn remove(&self, owner_id: &str, name: &str) -> Result<bool, RegistryError> {
        let mut projects = self.projects.write().await;
        let existed = projects.remove(&project_key(owner_id, name)).is_some();
        if existed {
            self.store.save(&projects)?;
            info!(owner = %owner_id, project = %name, "removed project");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use crate::{JsonSnapshotStore, MemorySnapshotStore};

    use super::*;

    fn registry(allowed_roots: Vec<PathBuf>) -> ProjectRegistry {
        ProjectRegistry::open(MemorySnapshotStore::new(), allowed_roots).unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(Vec::new());

        registry
            .add("alice", "API", dir.path(), Some("backend".into()))
            .await
            .unwrap();

        let found = registry.get("alice", "  api ").await.unwrap();
        assert_eq!(found.name, "API");
        assert_eq!(found.description.as_deref(), Some("backend"));
        assert!(registry.get("bob", "api").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(Vec::new());

        registry.add("alice", "api", dir.path(), None).await.unwrap();
        let err = registry.add("alice", "API", dir.path(), None).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(msg) if msg.contains("already exists")));
    }

    #[tokio::test]
    async fn test_missing_path_rejected() {
        let registry = registry(Vec::new());
        let err = registry
            .add("alice", "gone", Path::new("/definitely/not/here"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(msg) if msg.contains("does not exist")));
    }

    #[tokio::test]
    async fn test_file_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "hi").unwrap();

        let registry = registry(Vec::new());
        let err = registry.add("alice", "file", &file, None).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(msg) if msg.contains("not a directory")));
    }

    #[tokio::test]
    async fn test_allowed_roots_enforced() {
        let allowed = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let inside = allowed.path().join("svc");
        std::fs::create_dir(&inside).unwrap();

        let registry = registry(vec![allowed.path().to_path_buf()]);

        registry.add("alice", "svc", &inside, None).await.unwrap();
        assert!(registry.path_allowed(&inside));

        let err = registry
            .add("alice", "rogue", outside.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(msg) if msg.contains("allowed project roots")));
        assert!(!registry.path_allowed(outside.path()));
    }

    #[tokio::test]
    async fn test_empty_roots_allow_any_path() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(Vec::new());
        assert!(registry.path_allowed(dir.path()));
    }

    #[tokio::test]
    async fn test_list_is_per_owner_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(Vec::new());

        registry.add("alice", "zeta", dir.path(), None).await.unwrap();
        registry.add("alice", "alpha", dir.path(), None).await.unwrap();
        registry.add("bob", "beta", dir.path(), None).await.unwrap();

        let names: Vec<String> = registry
            .list("alice")
            .await
            .into_iter()
            .map(|project| project.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(Vec::new());

        registry.add("alice", "api", dir.path(), None).await.unwrap();
        assert!(registry.remove("alice", "api").await.unwrap());
        assert!(!registry.remove("alice", "api").await.unwrap());
        assert!(registry.get("alice", "api").await.is_none());
    }

    #[tokio::test]
    async fn test_projects_survive_reload() {
        let state = tempfile::tempdir().unwrap();
        let project_dir = tempfile::tempdir().unwrap();
        let path = state.path().join("projects.json");

        {
            let registry =
                ProjectRegistry::open(JsonSnapshotStore::new(&path), Vec::new()).unwrap();
            registry
                .add("alice", "api", project_dir.path(), None)
                .await
                .unwrap();
        }

        let reloaded = ProjectRegistry::open(JsonSnapshotStore::new(&path), Vec::new()).unwrap();
        let found = reloaded.get("alice", "api").await.unwrap();
        assert_eq!(found.path, project_dir.path().canonicalize().unwrap());
    }
}
