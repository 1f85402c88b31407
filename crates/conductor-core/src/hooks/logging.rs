use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::types::{HookContext, PostHookOutcome, PostToolHook};

/// Logs every tool execution
#[derive(Debug, Default)]
pub struct LoggingHook;

impl LoggingHook {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PostToolHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    async fn after_execute(
        &self,
        tool: &str,
        input: &Value,
        output: &str,
        ctx: &HookContext,
    ) -> Result<PostHookOutcome> {
        tracing::info!(
            session = %ctx.session_id,
            tool,
            input_keys = input.as_object().map(|o| o.len()).unwrap_or(0),
            output_len = output.len(),
            "Tool execution completed"
        );
        Ok(PostHookOutcome::allow())
    }
}
