//! Hook-gated tool execution
//!
//! Every tool call the model requests passes through the hook pipeline:
//! pre hooks may veto it, post hooks may rewrite its output.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{OrchestrationError, Result};
use crate::hooks::{HookNotice, HookPipeline, NoticeLevel};

/// Default timeout for tool execution
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs a named tool. Failures surface as `ExternalService`.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, input: &Value) -> Result<String>;
}

/// Output of a tool call that was allowed to run
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub output: String,
    /// Warnings from pre and post hooks, in order
    pub notices: Vec<HookNotice>,
    pub duration_ms: u64,
}

/// Wraps a [`ToolExecutor`] with the session's hook pipeline
pub struct GatedToolRunner {
    hooks: Arc<HookPipeline>,
    executor: Arc<dyn ToolExecutor>,
    timeout: Duration,
}

impl GatedToolRunner {
    pub fn new(hooks: Arc<HookPipeline>, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            hooks,
            executor,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn hooks(&self) -> &Arc<HookPipeline> {
        &self.hooks
    }

    /// Run pre hooks, the tool, then post hooks.
    ///
    /// A veto returns `HookBlocked` carrying the feedback meant for the agent
    /// and any warnings raised alongside it. The tool is never started.
    pub async fn run(&self, tool: &str, input: &Value) -> Result<ToolRun> {
        let pre = self.hooks.run_pre(tool, input).await;
        if !pre.allowed {
            tracing::info!(tool, blocked_by = ?pre.blocked_by, "Pre-hook blocked execution");
            return Err(OrchestrationError::HookBlocked {
                tool: tool.to_string(),
                messages: pre.agent_feedback(),
                warnings: pre
                    .notices
                    .into_iter()
                    .filter(|n| n.level == NoticeLevel::Warn)
                    .collect(),
            });
        }

        let start = Instant::now();
        let output = match tokio::time::timeout(self.timeout, self.executor.execute(tool, input)).await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(tool, timeout_secs = self.timeout.as_secs(), "Tool execution timed out");
                return Err(OrchestrationError::external(format!(
                    "Tool '{}' timed out after {} seconds",
                    tool,
                    self.timeout.as_secs()
                )));
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let post = self.hooks.run_post(tool, input, &output).await;
        let mut notices = pre.notices;
        notices.extend(post.notices);

        Ok(ToolRun {
            output: post.output,
            notices,
            duration_ms,
        })
    }
}
