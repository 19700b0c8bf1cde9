//! Environment-based server configuration.

use std::{fmt, path::PathBuf, time::Duration};

use tracing::warn;

/// How this instance handles incoming tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Execute tasks directly against the backend CLI.
    Runner,
    /// Route each task to the acting user's registered runner.
    Coordinator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runner => f.write_str("runner"),
            Self::Coordinator => f.write_str("coordinator"),
        }
    }
}

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub role: Role,
    /// Base directory for per-session working directories.
    pub working_dir: PathBuf,
    /// Roots project paths must fall under. Empty allows any path.
    pub allowed_project_dirs: Vec<PathBuf>,
    /// Directory holding the registry snapshot files.
    pub state_dir: PathBuf,
    /// Base command for the backend CLI, shell-style.
    pub backend_command: String,
    pub backend_timeout: Duration,
}

impl ServerConfig {
    /// Build config from environment variables, with defaults for
    /// everything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = std::env::var("RELAY_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);

        let role = match std::env::var("RELAY_ROLE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "coordinator" => Role::Coordinator,
            "runner" | "" => Role::Runner,
            other => {
                warn!(role = %other, "unknown RELAY_ROLE, falling back to runner");
                Role::Runner
            }
        };

        let working_dir = std::env::var("RELAY_WORKING_DIR")
            .map_or_else(|_| PathBuf::from("/tmp/agent-relay-tasks"), PathBuf::from);

        let allowed_project_dirs: Vec<PathBuf> = std::env::var("RELAY_ALLOWED_PROJECT_DIRS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        let state_dir = std::env::var("RELAY_STATE_DIR").map_or_else(
            |_| {
                agent_relay_registry::default_state_dir()
                    .unwrap_or_else(|| PathBuf::from(".agent-relay"))
            },
            PathBuf::from,
        );

        let backend_command =
            std::env::var("RELAY_BACKEND_COMMAND").unwrap_or_else(|_| "claude".to_string());

        let backend_timeout_secs: u64 = std::env::var("RELAY_BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        Self {
            host,
            port,
            role,
            working_dir,
            allowed_project_dirs,
            state_dir,
            backend_command,
            backend_timeout: Duration::from_secs(backend_timeout_secs),
        }
    }

    /// Address to bind the listener to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8123,
            role: Role::Runner,
            working_dir: PathBuf::from("/tmp/work"),
            allowed_project_dirs: Vec::new(),
            state_dir: PathBuf::from("/tmp/state"),
            backend_command: "claude".into(),
            backend_timeout: Duration::from_secs(300),
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:8123");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Runner.to_string(), "runner");
        assert_eq!(Role::Coordinator.to_string(), "coordinator");
    }
}
