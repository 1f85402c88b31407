//! External command hooks
//!
//! Runs a shell command for each matching tool call. The command receives a
//! JSON object on stdin:
//!
//! ```json
//! {"session_id": "...", "hook": "...", "tool_name": "...", "tool_input": {...}, "tool_output": "..."}
//! ```
//!
//! (`tool_output` only for post-tool hooks.)
//!
//! ## Exit Code Protocol
//! - 0: Allow (post hooks surface stdout as a warning if non-empty)
//! - 2: Block, stderr is the reason shown to the operator and the agent
//! - Other: Warn with stderr, continue
//!
//! The pipeline bounds each call with its hook timeout; the child process is
//! killed when the future is dropped.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::types::{HookContext, HookVerdict, PostHookOutcome, PostToolHook, PreToolHook};

/// Captured result of one hook command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    /// Map the exit code onto a verdict
    pub fn verdict(&self) -> HookVerdict {
        match self.exit_code {
            0 => HookVerdict::Allow,
            2 => {
                let reason = if self.stderr.is_empty() {
                    "Hook blocked execution".to_string()
                } else {
                    self.stderr.clone()
                };
                HookVerdict::block(reason)
            }
            code => {
                let message = if self.stderr.is_empty() {
                    format!("Hook exited with code {code}")
                } else {
                    self.stderr.clone()
                };
                HookVerdict::warn(message)
            }
        }
    }
}

/// Shell command run before or after matching tool calls
#[derive(Debug, Clone)]
pub struct CommandHook {
    name: String,
    command: String,
}

impl CommandHook {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Spawn `sh -c <command>`, feed `payload` on stdin, collect output
    pub async fn run(&self, payload: &Value) -> Result<CommandOutcome> {
        let input = serde_json::to_vec(payload).context("Failed to serialize hook input")?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn hook command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A hook that ignores stdin may close it early
            if let Err(e) = stdin.write_all(&input).await {
                tracing::debug!(hook = %self.name, "Hook did not read stdin: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .context("Hook command failed")?;

        let outcome = CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        tracing::debug!(
            hook = %self.name,
            exit_code = outcome.exit_code,
            stderr_len = outcome.stderr.len(),
            "Hook command complete"
        );
        Ok(outcome)
    }

    fn payload(&self, tool: &str, input: &Value, output: Option<&str>, ctx: &HookContext) -> Value {
        let mut payload = json!({
            "session_id": ctx.session_id,
            "hook": self.name,
            "tool_name": tool,
            "tool_input": input,
        });
        if let Some(out) = output {
            payload["tool_output"] = Value::String(out.to_string());
        }
        payload
    }
}

#[async_trait]
impl PreToolHook for CommandHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before_execute(
        &self,
        tool: &str,
        input: &Value,
        ctx: &HookContext,
    ) -> Result<HookVerdict> {
        let outcome = self.run(&self.payload(tool, input, None, ctx)).await?;
        Ok(outcome.verdict())
    }
}

#[async_trait]
impl PostToolHook for CommandHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn after_execute(
        &self,
        tool: &str,
        input: &Value,
        output: &str,
        ctx: &HookContext,
    ) -> Result<PostHookOutcome> {
        let outcome = self.run(&self.payload(tool, input, Some(output), ctx)).await?;
        let verdict = match outcome.verdict() {
            HookVerdict::Allow if !outcome.stdout.is_empty() => HookVerdict::warn(outcome.stdout),
            other => other,
        };
        Ok(PostHookOutcome::with_verdict(verdict))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn ctx() -> HookContext {
        HookContext {
            session_id: "sess-1".into(),
        }
    }

    #[tokio::test]
    async fn exit_zero_allows() {
        let hook = CommandHook::new("ok", "cat > /dev/null; exit 0");
        let v = hook.before_execute("bash", &json!({}), &ctx()).await.unwrap();
        assert_eq!(v, HookVerdict::Allow);
    }

    #[tokio::test]
    async fn exit_two_blocks_with_stderr() {
        let hook = CommandHook::new("deny", "echo 'no writes here' >&2; exit 2");
        let v = hook.before_execute("Write", &json!({}), &ctx()).await.unwrap();
        assert_eq!(v, HookVerdict::block("no writes here"));
    }

    #[tokio::test]
    async fn other_exit_warns() {
        let hook = CommandHook::new("lint", "exit 1");
        let v = hook.before_execute("Write", &json!({}), &ctx()).await.unwrap();
        assert_eq!(v, HookVerdict::warn("Hook exited with code 1"));
    }

    #[tokio::test]
    async fn payload_reaches_stdin() {
        let hook = CommandHook::new(
            "echo-tool",
            r#"input=$(cat); case "$input" in *'"tool_name":"Write"'*'"session_id"'*|*'"session_id"'*'"tool_name":"Write"'*) exit 0;; *) exit 2;; esac"#,
        );
        let v = hook
            .before_execute("Write", &json!({"file_path": "a"}), &ctx())
            .await
            .unwrap();
        assert_eq!(v, HookVerdict::Allow);
    }

    #[tokio::test]
    async fn post_hook_surfaces_stdout() {
        let hook = CommandHook::new("fmt", "cat > /dev/null; echo formatted 3 files");
        let out = hook
            .after_execute("Write", &json!({}), "ok", &ctx())
            .await
            .unwrap();
        assert_eq!(out.verdict, HookVerdict::warn("formatted 3 files"));
        assert!(out.replacement.is_none());
    }
}
