//! Routing decisions for incoming task requests.
//!
//! A coordinator never executes tasks itself. Each request resolves to
//! the acting user's own runner, the cluster, or a rejection, and users
//! can only reach another user's runner through an explicit sharing
//! grant.

use std::sync::Arc;

use agent_relay_core::{ApprovalSubmission, CreateTaskRequest, ExecutionMode, Task, TaskId};
use agent_relay_registry::UserRegistry;
use tracing::info;

use crate::forward::{ForwardClient, ForwardError};

/// Routing failure.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The request cannot be routed; the reason is shown to the caller.
    #[error("{0}")]
    Rejected(String),
    /// The decision came out `cluster`, which has no dispatch path here.
    #[error("Cluster execution is not available on this coordinator")]
    ClusterUnavailable,
    /// The decision resolved a runner but forwarding to it failed.
    #[error(transparent)]
    Remote(#[from] ForwardError),
}

/// Where one request should go. Recomputed per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Forward to the acting identity's runner.
    Runner {
        url: String,
        auth_token: Option<String>,
    },
    /// Hand off to the cluster. Decision only; see [`RoutingError`].
    Cluster,
    /// Not routable.
    Reject { reason: String },
}

/// Decides where each request executes and forwards it there.
pub struct TaskRouter {
    registry: Arc<UserRegistry>,
    client: ForwardClient,
}

impl TaskRouter {
    #[must_use]
    pub fn new(registry: Arc<UserRegistry>) -> Self {
        Self {
            registry,
            client: ForwardClient::new(),
        }
    }

    /// Resolve a request to a routing verdict.
    ///
    /// The acting identity is resolved before mode on purpose: sharing
    /// gates identity resolution, so a requester learns nothing about a
    /// target's configuration without a grant.
    pub async fn decide(
        &self,
        requester_id: &str,
        target_user_id: Option<&str>,
        requested_mode: Option<ExecutionMode>,
    ) -> RouteDecision {
        let acting = if let Some(target) = target_user_id.filter(|target| *target != requester_id)
        {
            if !self.registry.can_act(target, requester_id).await {
                return RouteDecision::Reject {
                    reason: "You don't have access to that user's runner. Ask them to share \
                             access with you."
                        .to_string(),
                };
            }
            match self.registry.resolve(target).await {
                Some(user) => user,
                None => {
                    return RouteDecision::Reject {
                        reason: format!("Target user '{target}' is not registered."),
                    };
                }
            }
        } else {
            match self.registry.resolve(requester_id).await {
                Some(user) => user,
                None => {
                    return RouteDecision::Reject {
                        reason: format!(
                            "User '{requester_id}' is not registered. Register a runner for \
                             this user first."
                        ),
                    };
                }
            }
        };

        let mode = requested_mode.unwrap_or(acting.default_mode);
        match mode {
            ExecutionMode::Local => match acting.runner_url {
                Some(url) => RouteDecision::Runner {
                    url,
                    auth_token: acting.runner_token,
                },
                None => RouteDecision::Reject {
                    reason: "No runner registered for this account. Register a runner URL \
                             first."
                        .to_string(),
                },
            },
            ExecutionMode::Cluster => {
                if acting.cluster_enabled {
                    RouteDecision::Cluster
                } else {
                    RouteDecision::Reject {
                        reason: "Cluster access is not enabled for this account.".to_string(),
                    }
                }
            }
        }
    }

    /// Route a task creation: decide, then forward the reduced payload.
    ///
    /// The forwarded body strips requester, target, and mode. Those are
    /// resolved here; the runner executes whatever it receives.
    ///
    /// # Errors
    /// `Rejected` on an adverse decision, `ClusterUnavailable` on a
    /// cluster verdict, `Remote` when the runner cannot be reached.
    pub async fn route_task(
        &self,
        requester_id: &str,
        request: &CreateTaskRequest,
    ) -> Result<Task, RoutingError> {
        let (url, token) = self
            .resolve_runner(
                requester_id,
                request.target_user_id.as_deref(),
                request.mode,
            )
            .await?;
        info!(requester = %requester_id, url = %url, "forwarding task to runner");
        let task = self
            .client
            .forward_task(&url, token.as_deref(), &request.forwarded())
            .await?;
        Ok(task)
    }

    /// Route a task status fetch to the requester's runner.
    ///
    /// # Errors
    /// As [`Self::route_task`]; a runner 404 surfaces as
    /// [`ForwardError::TaskNotFound`].
    pub async fn route_get_task(
        &self,
        requester_id: &str,
        task_id: TaskId,
    ) -> Result<Task, RoutingError> {
        let (url, token) = self.resolve_runner(requester_id, None, None).await?;
        let task = self
            .client
            .forward_get_task(&url, token.as_deref(), task_id)
            .await?;
        Ok(task)
    }

    /// Route an approval submission to the requester's runner.
    ///
    /// # Errors
    /// As [`Self::route_task`].
    pub async fn route_approval(
        &self,
        requester_id: &str,
        task_id: TaskId,
        submission: &ApprovalSubmission,
    ) -> Result<Task, RoutingError> {
        let (url, token) = self.resolve_runner(requester_id, None, None).await?;
        info!(requester = %requester_id, task = %task_id, "forwarding approval to runner");
        let task = self
            .client
            .forward_approval(&url, token.as_deref(), task_id, submission)
            .await?;
        Ok(task)
    }

    async fn resolve_runner(
        &self,
        requester_id: &str,
        target_user_id: Option<&str>,
        requested_mode: Option<ExecutionMode>,
    ) -> Result<(String, Option<String>), RoutingError> {
        match self.decide(requester_id, target_user_id, requested_mode).await {
            RouteDecision::Runner { url, auth_token } => Ok((url, auth_token)),
            RouteDecision::Cluster => Err(RoutingError::ClusterUnavailable),
            RouteDecision::Reject { reason } => Err(RoutingError::Rejected(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use agent_relay_registry::MemorySnapshotStore;

    use super::*;

    async fn router_with_users() -> TaskRouter {
        let registry = Arc::new(UserRegistry::open(MemorySnapshotStore::new()).unwrap());
        registry
            .register_runner("alice", "Alice", "http://alice.example:8000", Some("tok-a".into()))
            .await
            .unwrap();
        registry
            .enable_cluster("carol", "Carol", None)
            .await
            .unwrap();
        TaskRouter::new(registry)
    }

    #[tokio::test]
    async fn test_own_runner_never_requires_a_grant() {
        let router = router_with_users().await;

        let direct = router.decide("alice", None, None).await;
        let self_target = router.decide("alice", Some("alice"), None).await;

        let expected = RouteDecision::Runner {
            url: "http://alice.example:8000".into(),
            auth_token: Some("tok-a".into()),
        };
        assert_eq!(direct, expected);
        assert_eq!(self_target, expected);
    }

    #[tokio::test]
    async fn test_target_without_grant_is_rejected() {
        let router = router_with_users().await;

        let decision = router.decide("bob", Some("alice"), None).await;
        let RouteDecision::Reject { reason } = decision else {
            panic!("expected rejection, got {decision:?}");
        };
        assert!(reason.contains("share access"));
    }

    #[tokio::test]
    async fn test_granted_target_routes_to_owner_runner() {
        let router = router_with_users().await;
        router.registry.grant_access("alice", "bob").await.unwrap();

        let decision = router.decide("bob", Some("alice"), None).await;
        assert_eq!(
            decision,
            RouteDecision::Runner {
                url: "http://alice.example:8000".into(),
                auth_token: Some("tok-a".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_unregistered_requester_rejected_by_name() {
        let router = router_with_users().await;

        let decision = router.decide("ghost", None, None).await;
        let RouteDecision::Reject { reason } = decision else {
            panic!("expected rejection, got {decision:?}");
        };
        assert!(reason.contains("'ghost' is not registered"));
    }

    #[tokio::test]
    async fn test_missing_runner_url_rejected() {
        let router = router_with_users().await;

        // Carol exists (cluster enabled) but has no runner endpoint.
        let decision = router
            .decide("carol", None, Some(ExecutionMode::Local))
            .await;
        let RouteDecision::Reject { reason } = decision else {
            panic!("expected rejection, got {decision:?}");
        };
        assert!(reason.contains("No runner registered"));
    }

    #[tokio::test]
    async fn test_cluster_mode_gated_by_eligibility() {
        let router = router_with_users().await;

        assert_eq!(
            router.decide("carol", None, Some(ExecutionMode::Cluster)).await,
            RouteDecision::Cluster
        );

        let decision = router
            .decide("alice", None, Some(ExecutionMode::Cluster))
            .await;
        assert!(matches!(decision, RouteDecision::Reject { .. }));
    }

    #[tokio::test]
    async fn test_mode_defaults_to_acting_identity() {
        let router = router_with_users().await;
        router
            .registry
            .set_default_mode("carol", ExecutionMode::Cluster)
            .await
            .unwrap();

        assert_eq!(router.decide("carol", None, None).await, RouteDecision::Cluster);
    }

    #[tokio::test]
    async fn test_cluster_verdict_has_no_dispatch() {
        let router = router_with_users().await;
        let request = CreateTaskRequest {
            prompt: "hi".into(),
            session_id: None,
            project: None,
            working_dir: None,
            requester_id: Some("carol".into()),
            target_user_id: None,
            mode: Some(ExecutionMode::Cluster),
        };

        let err = router.route_task("carol", &request).await.unwrap_err();
        assert!(matches!(err, RoutingError::ClusterUnavailable));
    }
}
