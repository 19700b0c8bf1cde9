//! One-shot invocation of the assistant CLI.

use std::{path::Path, process::Stdio, time::Duration};

use agent_relay_core::{AgentBackend, ApprovalRequest, ExecutionResult};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::CommandBuilder;

/// Default invocation ceiling, matching the remote-forwarding timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Backend adapter that runs the assistant CLI once per session turn.
///
/// The invocation is `<base> -p <prompt> --output-format json`, plus
/// `--resume <token>` when continuing a conversation. Every failure
/// mode (missing tool, spawn error, timeout, non-zero exit) is
/// captured into a failed [`ExecutionResult`]; this adapter never
/// panics or errors across the trait boundary.
pub struct CliBackend {
    command: CommandBuilder,
    timeout: Duration,
}

impl CliBackend {
    /// Adapter around the given base command with the default timeout.
    #[must_use]
    pub fn new(command: CommandBuilder) -> Self {
        Self {
            command,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AgentBackend for CliBackend {
    async fn invoke(
        &self,
        working_dir: &Path,
        prompt: &str,
        resume_token: Option<&str>,
    ) -> ExecutionResult {
        let builder = self
            .command
            .clone()
            .params(["-p", prompt, "--output-format", "json"]);
        let built = match resume_token {
            Some(token) => builder.build_follow_up(&["--resume".to_string(), token.to_string()]),
            None => builder.build_initial(),
        };
        let parts = match built {
            Ok(parts) => parts,
            Err(err) => return ExecutionResult::failure(format!("invalid backend command: {err}")),
        };

        let program = parts.program.clone();
        let (executable, args) = match parts.into_resolved().await {
            Ok(resolved) => resolved,
            Err(_) => {
                return ExecutionResult::failure(format!(
                    "Backend CLI '{program}' not found. Install it with: npm install -g @anthropic-ai/claude-code"
                ));
            }
        };

        debug!(
            program = %executable.display(),
            resumed = resume_token.is_some(),
            working_dir = %working_dir.display(),
            "invoking backend"
        );

        let mut cmd = Command::new(&executable);
        cmd.args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                return ExecutionResult::failure(format!("failed to start backend: {err}"));
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return ExecutionResult::failure(format!("backend process error: {err}"));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "backend invocation timed out");
                return ExecutionResult::failure(format!(
                    "Execution timed out after {} seconds",
                    self.timeout.as_secs()
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!(
                    "Process exited with code {}",
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.to_string()
            };
            return ExecutionResult::failure(message);
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Interpret one invocation's stdout.
///
/// Structured JSON output yields the extracted result text, the
/// announced session token, and (when flagged) the nested approval
/// request. Anything unparseable completes with the raw text; output
/// is never a reason to fail on its own.
fn parse_output(stdout: &str) -> ExecutionResult {
    let raw = stdout.trim();
    let Ok(data) = serde_json::from_str::<Value>(raw) else {
        return ExecutionResult::completed(raw);
    };
    if !data.is_object() {
        return ExecutionResult::completed(raw);
    }

    let output = data
        .get("result")
        .and_then(Value::as_str)
        .or_else(|| data.get("output").and_then(Value::as_str))
        .unwrap_or(raw)
        .to_string();
    let backend_session = data
        .get("session_id")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    if data.get("needs_approval").and_then(Value::as_bool) == Some(true) {
        let request = data
            .get("approval_request")
            .cloned()
            .map(serde_json::from_value::<ApprovalRequest>);
        return match request {
            Some(Ok(request)) => {
                let mut result = ExecutionResult::needs_approval(output, request);
                result.backend_session = backend_session;
                result
            }
            _ => ExecutionResult::failure(
                "backend reported needs_approval without a valid approval_request",
            ),
        };
    }

    let mut result = ExecutionResult::completed(output);
    result.backend_session = backend_session;
    result
}

#[cfg(test)]
mod tests {
    use agent_relay_core::TaskStatus;

    use super::*;

    fn backend(base: &str) -> CliBackend {
        CliBackend::new(CommandBuilder::new(base))
    }

    #[test]
    fn test_parse_prefers_result_then_output() {
        let result = parse_output(r#"{"result": "from result", "output": "from output"}"#);
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output, "from result");

        let result = parse_output(r#"{"output": "from output"}"#);
        assert_eq!(result.output, "from output");
    }

    #[test]
    fn test_parse_captures_session_token() {
        let result = parse_output(r#"{"result": "ok", "session_id": "cli-77"}"#);
        assert_eq!(result.backend_session.as_deref(), Some("cli-77"));
    }

    #[test]
    fn test_parse_needs_approval_preserves_options() {
        let result = parse_output(
            r#"{
                "needs_approval": true,
                "result": "about to run a command",
                "approval_request": {
                    "action": "run_command",
                    "description": "Run `cargo publish`",
                    "options": [
                        {"id": "approve", "label": "Approve"},
                        {"id": "deny", "label": "Deny", "description": "Skip"}
                    ]
                }
            }"#,
        );

        assert_eq!(result.status, TaskStatus::NeedsApproval);
        let request = result.approval_request.unwrap();
        assert_eq!(request.action, "run_command");
        assert_eq!(request.options.len(), 2);
        assert_eq!(request.options[0].id, "approve");
        assert_eq!(request.options[1].description.as_deref(), Some("Skip"));
    }

    #[test]
    fn test_parse_malformed_approval_is_failure() {
        let result = parse_output(r#"{"needs_approval": true, "result": "hm"}"#);
        assert_eq!(result.status, TaskStatus::Failed);
    }

    #[test]
    fn test_parse_unstructured_output_completes_raw() {
        let result = parse_output("plain text, not json");
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output, "plain text, not json");

        let result = parse_output("[1, 2, 3]");
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output, "[1, 2, 3]");
    }

    #[tokio::test]
    async fn test_missing_tool_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = backend("agent-relay-no-such-binary")
            .invoke(dir.path(), "hi", None)
            .await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_a_normal_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = backend("sh -c 'sleep 5' relay")
            .with_timeout(Duration::from_secs(1))
            .invoke(dir.path(), "hi", None)
            .await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.error.unwrap().contains("timed out after 1 seconds"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let result = backend("sh -c 'echo boom >&2; exit 3' relay")
            .invoke(dir.path(), "hi", None)
            .await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_reported_when_stderr_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = backend("sh -c 'exit 7' relay").invoke(dir.path(), "hi", None).await;

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Process exited with code 7"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plain_stdout_completes() {
        let dir = tempfile::tempdir().unwrap();
        let result = backend("sh -c 'echo plain text' relay")
            .invoke(dir.path(), "hi", None)
            .await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output, "plain text");
        assert!(result.error.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_structured_stdout_parsed_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let base = r#"sh -c 'echo "{\"result\": \"done\", \"session_id\": \"cli-1\"}"' relay"#;
        let result = backend(base).invoke(dir.path(), "hi", None).await;

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.output, "done");
        assert_eq!(result.backend_session.as_deref(), Some("cli-1"));
    }
}
