//! Task routing for agent-relay coordinators.
//!
//! Provides:
//! - `TaskRouter` - per-request routing verdicts with access control
//! - `ForwardClient` - HTTP forwarding to a resolved runner

pub mod forward;
pub mod router;

pub use forward::{FORWARD_TIMEOUT, ForwardClient, ForwardError};
pub use router::{RouteDecision, RoutingError, TaskRouter};
