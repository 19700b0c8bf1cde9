//! Execution mode selection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a task should execute.
///
/// This is a closed set: unknown wire values fail deserialization at the
/// boundary instead of flowing into the routing engine as loose strings.
/// "Unspecified" is expressed as `Option<ExecutionMode>` and resolved from
/// the acting identity's stored default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run on the acting identity's registered runner endpoint.
    Local,
    /// Hand off to the cluster target (routing outcome only).
    Cluster,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Cluster => f.write_str("cluster"),
        }
    }
}
