//! Execution backend adapter for the assistant CLI.
//!
//! Provides:
//! - Command building utilities (shell-style base command + per-call args)
//! - [`CliBackend`], the one-shot subprocess adapter with bounded timeout

pub mod cli;
pub mod command;

pub use cli::{CliBackend, DEFAULT_TIMEOUT};
pub use command::{CommandBuildError, CommandBuilder, CommandParts, resolve_executable_path};
