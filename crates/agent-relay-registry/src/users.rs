//! User identities, runner endpoints, and sharing grants.

use std::collections::HashMap;

use agent_relay_core::{ExecutionMode, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{RegistryError, SnapshotStore};

/// One user's registration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable, caller-assigned id.
    pub id: UserId,
    /// Human-readable name.
    pub display_name: String,
    /// Endpoint of this user's runner, when registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_url: Option<String>,
    /// Bearer token presented when forwarding to the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_token: Option<String>,
    /// Whether cluster routing is enabled for this user.
    #[serde(default)]
    pub cluster_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_storage_path: Option<String>,
    /// Mode used when a request does not name one.
    #[serde(default)]
    pub default_mode: ExecutionMode,
    /// Users granted access to act through this user's runner.
    ///
    /// Self-access is implicit and never listed here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_with: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl UserIdentity {
    fn new(id: &str, display_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            runner_url: None,
            runner_token: None,
            cluster_enabled: false,
            cluster_storage_path: None,
            default_mode: ExecutionMode::default(),
            shared_with: Vec::new(),
            created_at: now,
            last_seen: now,
        }
    }
}

type UserMap = HashMap<UserId, UserIdentity>;

/// Registry of user identities and their sharing grants.
///
/// Answers "may requester X act as user Y" and owns the runner
/// endpoint configuration routing decisions read. Every mutation
/// persists the full snapshot before returning success.
pub struct UserRegistry {
    users: RwLock<UserMap>,
    store: Box<dyn SnapshotStore<UserMap>>,
}

impl UserRegistry {
    /// Open the registry, loading the last snapshot if one exists.
    ///
    /// # Errors
    /// Returns an error when the snapshot exists but cannot be read.
    pub fn open(store: impl SnapshotStore<UserMap> + 'static) -> Result<Self, RegistryError> {
        let users = store.load()?.unwrap_or_default();
        Ok(Self {
            users: RwLock::new(users),
            store: Box::new(store),
        })
    }

    /// Register (or re-register) a user's runner endpoint.
    ///
    /// Creates the identity on first contact; otherwise updates the
    /// endpoint in place.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be persisted.
    pub async fn register_runner(
        &self,
        user_id: &str,
        display_name: &str,
        url: &str,
        token: Option<String>,
    ) -> Result<UserIdentity, RegistryError> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        let entry = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserIdentity::new(user_id, display_name, now));
        entry.display_name = display_name.to_string();
        entry.runner_url = Some(url.to_string());
        entry.runner_token = token;
        entry.last_seen = now;
        let registered = entry.clone();
        self.store.save(&users)?;
        info!(user = %user_id, url = %url, "registered runner endpoint");
        Ok(registered)
    }

    /// Remove a user's runner endpoint, keeping the identity.
    ///
    /// # Errors
    /// `UserNotFound` when the id is unknown, or a persistence error.
    pub async fn unregister_runner(&self, user_id: &str) -> Result<(), RegistryError> {
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(user_id)
            .ok_or_else(|| RegistryError::UserNotFound(user_id.to_string()))?;
        entry.runner_url = None;
        entry.runner_token = None;
        entry.last_seen = Utc::now();
        self.store.save(&users)?;
        info!(user = %user_id, "unregistered runner endpoint");
        Ok(())
    }

    /// Enable cluster routing for a user, creating the identity if new.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be persisted.
    pub async fn enable_cluster(
        &self,
        user_id: &str,
        display_name: &str,
        storage_path: Option<String>,
    ) -> Result<UserIdentity, RegistryError> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        let entry = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserIdentity::new(user_id, display_name, now));
        entry.display_name = display_name.to_string();
        entry.cluster_enabled = true;
        entry.cluster_storage_path = storage_path;
        entry.last_seen = now;
        let enabled = entry.clone();
        self.store.save(&users)?;
        info!(user = %user_id, "enabled cluster routing");
        Ok(enabled)
    }

    /// Disable cluster routing.
    ///
    /// # Errors
    /// `UserNotFound` when the id is unknown, or a persistence error.
    pub async fn disable_cluster(&self, user_id: &str) -> Result<(), RegistryError> {
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(user_id)
            .ok_or_else(|| RegistryError::UserNotFound(user_id.to_string()))?;
        entry.cluster_enabled = false;
        entry.last_seen = Utc::now();
        self.store.save(&users)?;
        Ok(())
    }

    /// Set the mode used when a request does not name one.
    ///
    /// # Errors
    /// `UserNotFound` when the id is unknown, or a persistence error.
    pub async fn set_default_mode(
        &self,
        user_id: &str,
        mode: ExecutionMode,
    ) -> Result<(), RegistryError> {
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(user_id)
            .ok_or_else(|| RegistryError::UserNotFound(user_id.to_string()))?;
        entry.default_mode = mode;
        entry.last_seen = Utc::now();
        self.store.save(&users)?;
        info!(user = %user_id, %mode, "set default mode");
        Ok(())
    }

    /// Look up an identity, touching its last-seen timestamp.
    ///
    /// The touch is metadata, so a failure to persist it is logged
    /// rather than surfaced.
    pub async fn resolve(&self, user_id: &str) -> Option<UserIdentity> {
        let mut users = self.users.write().await;
        let entry = users.get_mut(user_id)?;
        entry.last_seen = Utc::now();
        let found = entry.clone();
        if let Err(err) = self.store.save(&users) {
            warn!(user = %user_id, error = %err, "failed to persist last-seen touch");
        }
        Some(found)
    }

    /// May `requester_id` act through `owner_id`'s runner?
    ///
    /// Owners always may. An unknown owner answers false.
    pub async fn can_act(&self, owner_id: &str, requester_id: &str) -> bool {
        if owner_id == requester_id {
            return true;
        }
        let users = self.users.read().await;
        users
            .get(owner_id)
            .is_some_and(|owner| owner.shared_with.iter().any(|id| id == requester_id))
    }

    /// Grant `grantee_id` access to act through `owner_id`'s runner.
    ///
    /// Idempotent: granting twice leaves a single entry.
    ///
    /// # Errors
    /// `UserNotFound` when the owner is unknown, or a persistence error.
    pub async fn grant_access(
        &self,
        owner_id: &str,
        grantee_id: &str,
    ) -> Result<(), RegistryError> {
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(owner_id)
            .ok_or_else(|| RegistryError::UserNotFound(owner_id.to_string()))?;
        if !entry.shared_with.iter().any(|id| id == grantee_id) {
            entry.shared_with.push(grantee_id.to_string());
        }
        self.store.save(&users)?;
        info!(owner = %owner_id, grantee = %grantee_id, "granted runner access");
        Ok(())
    }

    /// Revoke a previously granted access.
    ///
    /// # Errors
    /// `UserNotFound` when the owner is unknown, `GrantNotFound` when
    /// no such grant exists, or a persistence error.
    pub async fn revoke_access(
        &self,
        owner_id: &str,
        grantee_id: &str,
    ) -> Result<(), RegistryError> {
        let mut users = self.users.write().await;
        let entry = users
            .get_mut(owner_id)
            .ok_or_else(|| RegistryError::UserNotFound(owner_id.to_string()))?;
        let before = entry.shared_with.len();
        entry.shared_with.retain(|id| id != grantee_id);
        if entry.shared_with.len() == before {
            return Err(RegistryError::GrantNotFound {
                owner: owner_id.to_string(),
                grantee: grantee_id.to_string(),
            });
        }
        self.store.save(&users)?;
        info!(owner = %owner_id, grantee = %grantee_id, "revoked runner access");
        Ok(())
    }

    /// Users the owner currently shares with.
    ///
    /// # Errors
    /// `UserNotFound` when the owner is unknown.
    pub async fn shared_with(&self, owner_id: &str) -> Result<Vec<UserId>, RegistryError> {
        let users = self.users.read().await;
        users
            .get(owner_id)
            .map(|owner| owner.shared_with.clone())
            .ok_or_else(|| RegistryError::UserNotFound(owner_id.to_string()))
    }

    /// All registered identities, ordered by id.
    pub async fn list(&self) -> Vec<UserIdentity> {
        let users = self.users.read().await;
        let mut all: Vec<UserIdentity> = users.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Identities the requester may act through that have a runner
    /// configured. An identity without an endpoint is not accessible
    /// even to its owner, since there is nothing to route to.
    pub async fn list_accessible(&self, requester_id: &str) -> Vec<UserIdentity> {
        let users = self.users.read().await;
        let mut accessible: Vec<UserIdentity> = users
            .values()
            .filter(|user| user.runner_url.is_some())
            .filter(|user| {
                user.id == requester_id || user.shared_with.iter().any(|id| id == requester_id)
            })
            .cloned()
            .collect();
        accessible.sort_by(|a, b| a.id.cmp(&b.id));
        accessible
    }

    /// Remove an identity and every grant it owned.
    ///
    /// Grants *to* this user recorded by other owners are untouched.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be persisted.
    pub async fn remove(&self, user_id: &str) -> Result<bool, RegistryError> {
        let mut users = self.users.write().await;
        let existed = users.remove(user_id).is_some();
        if existed {
            self.store.save(&users)?;
            info!(user = %user_id, "removed user");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use crate::{JsonSnapshotStore, MemorySnapshotStore};

    use super::*;

    fn registry() -> UserRegistry {
        UserRegistry::open(MemorySnapshotStore::new()).unwrap()
    }

    #[tokio::test]
    async fn test_can_act_self_without_grants() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();

        assert!(registry.can_act("alice", "alice").await);
        assert!(registry.can_act("ghost", "ghost").await);
    }

    #[tokio::test]
    async fn test_grant_then_revoke() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();

        assert!(!registry.can_act("alice", "bob").await);

        registry.grant_access("alice", "bob").await.unwrap();
        assert!(registry.can_act("alice", "bob").await);

        registry.revoke_access("alice", "bob").await.unwrap();
        assert!(!registry.can_act("alice", "bob").await);
    }

    #[tokio::test]
    async fn test_grant_requires_owner() {
        let registry = registry();
        let err = registry.grant_access("nobody", "bob").await.unwrap_err();
        assert!(matches!(err, RegistryError::UserNotFound(id) if id == "nobody"));
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();

        registry.grant_access("alice", "bob").await.unwrap();
        registry.grant_access("alice", "bob").await.unwrap();

        assert_eq!(registry.shared_with("alice").await.unwrap(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_revoke_missing_grant() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();

        let err = registry.revoke_access("alice", "bob").await.unwrap_err();
        assert!(matches!(err, RegistryError::GrantNotFound { .. }));
    }

    #[tokio::test]
    async fn test_register_upserts() {
        let registry = registry();
        let first = registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();
        let second = registry
            .register_runner("alice", "Alice A.", "http://localhost:9001", Some("tok".into()))
            .await
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.runner_url.as_deref(), Some("http://localhost:9001"));
        assert_eq!(second.runner_token.as_deref(), Some("tok"));
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_touches_last_seen() {
        let registry = registry();
        let registered = registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();

        let resolved = registry.resolve("alice").await.unwrap();
        assert!(resolved.last_seen >= registered.last_seen);
        assert!(registry.resolve("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_accessible_requires_endpoint() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();
        registry
            .enable_cluster("carol", "Carol", None)
            .await
            .unwrap();
        registry.grant_access("alice", "bob").await.unwrap();
        registry.grant_access("carol", "bob").await.unwrap();

        let accessible = registry.list_accessible("bob").await;
        let ids: Vec<&str> = accessible.iter().map(|user| user.id.as_str()).collect();
        assert_eq!(ids, vec!["alice"]);

        let own = registry.list_accessible("carol").await;
        assert!(own.is_empty());
    }

    #[tokio::test]
    async fn test_default_mode_updates() {
        let registry = registry();
        registry
            .enable_cluster("alice", "Alice", Some("/data/alice".into()))
            .await
            .unwrap();
        registry
            .set_default_mode("alice", ExecutionMode::Cluster)
            .await
            .unwrap();

        let identity = registry.resolve("alice").await.unwrap();
        assert_eq!(identity.default_mode, ExecutionMode::Cluster);
        assert!(identity.cluster_enabled);
    }

    #[tokio::test]
    async fn test_remove_clears_owned_grants() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", None)
            .await
            .unwrap();
        registry.grant_access("alice", "bob").await.unwrap();

        assert!(registry.remove("alice").await.unwrap());
        assert!(!registry.can_act("alice", "bob").await);
        assert!(!registry.remove("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_unregister_clears_endpoint() {
        let registry = registry();
        registry
            .register_runner("alice", "Alice", "http://localhost:9000", Some("tok".into()))
            .await
            .unwrap();
        registry.unregister_runner("alice").await.unwrap();

        let identity = registry.resolve("alice").await.unwrap();
        assert!(identity.runner_url.is_none());
        assert!(identity.runner_token.is_none());
        assert!(registry.list_accessible("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_mutations_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        {
            let registry = UserRegistry::open(JsonSnapshotStore::new(&path)).unwrap();
            registry
                .register_runner("alice", "Alice", "http://localhost:9000", Some("tok".into()))
                .await
                .unwrap();
            registry.grant_access("alice", "bob").await.unwrap();
        }

        let reloaded = UserRegistry::open(JsonSnapshotStore::new(&path)).unwrap();
        assert!(reloaded.can_act("alice", "bob").await);
        let identity = reloaded.resolve("alice").await.unwrap();
        assert_eq!(identity.runner_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(identity.runner_token.as_deref(), Some("tok"));
    }
}
