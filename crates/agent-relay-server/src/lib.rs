//! HTTP server for agent-relay.
//!
//! One binary serves both roles. A runner executes tasks against the
//! local backend CLI; a coordinator routes each task to the acting
//! user's registered runner instead.

pub mod config;
pub mod routes;
pub mod state;

pub use config::{Role, ServerConfig};
pub use routes::build_router;
pub use state::AppState;
