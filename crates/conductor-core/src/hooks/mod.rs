//! Hook system for tool execution
//!
//! Intercepts tool calls before and after execution for validation,
//! safety, redaction, and logging.
//!
//! ## Built-in Hooks
//! - `SecurityReminderHook` - Reminds about risky patterns in file edits
//! - `ShellGuardHook` - Blocks destructive shell commands
//! - `RedactionHook` - Scrubs secrets from tool output
//! - `LoggingHook` - Logs all tool executions
//!
//! ## Custom Hooks
//! Implement `PreToolHook` or `PostToolHook`, or configure a `CommandHook`.

pub mod command;
pub mod logging;
pub mod pipeline;
pub mod redaction;
pub mod security;
pub mod shell_guard;
pub mod types;

use std::sync::Arc;

use anyhow::Result;

pub use command::{CommandHook, CommandOutcome};
pub use logging::LoggingHook;
pub use pipeline::{
    HookNotice, HookPipeline, NoticeLevel, PostToolReport, PreToolReport, DEFAULT_HOOK_TIMEOUT,
};
pub use redaction::RedactionHook;
pub use security::SecurityReminderHook;
pub use shell_guard::ShellGuardHook;
pub use types::{
    HookAction, HookContext, HookDefinition, HookMessage, HookVerdict, PostHookOutcome,
    PostToolHook, PreToolHook, ToolMatcher,
};

use crate::config::ConductorConfig;

impl HookPipeline {
    /// Assemble built-in and configured hooks for one session.
    ///
    /// Order: security reminder, shell guard, configured pre hooks;
    /// redaction, configured post hooks, logging.
    pub fn from_config(config: &ConductorConfig, session_id: impl Into<String>) -> Result<Self> {
        let mut pipeline = HookPipeline::new(session_id).with_timeout(config.hook_timeout());
        let builtin = &config.builtin_hooks;

        if builtin.security_reminder {
            pipeline.register(HookDefinition::pre(
                ToolMatcher::parse(security::FILE_EDIT_TOOLS),
                Arc::new(SecurityReminderHook::new()),
            ));
        }
        if builtin.shell_guard {
            pipeline.register(HookDefinition::pre(
                ToolMatcher::parse(shell_guard::SHELL_TOOLS),
                Arc::new(ShellGuardHook::new()),
            ));
        }
        for (i, hook) in config.hooks.pre_tool_use.iter().enumerate() {
            let name = hook.name.clone().unwrap_or_else(|| format!("pre-command-{}", i + 1));
            pipeline.register(HookDefinition::pre(
                ToolMatcher::parse(&hook.matcher),
                Arc::new(CommandHook::new(name, hook.command.clone())),
            ));
        }

        if builtin.redaction {
            pipeline.register(HookDefinition::post(
                ToolMatcher::Any,
                Arc::new(RedactionHook::with_patterns(&config.redaction.patterns)?),
            ));
        }
        for (i, hook) in config.hooks.post_tool_use.iter().enumerate() {
            let name = hook.name.clone().unwrap_or_else(|| format!("post-command-{}", i + 1));
            pipeline.register(HookDefinition::post(
                ToolMatcher::parse(&hook.matcher),
                Arc::new(CommandHook::new(name, hook.command.clone())),
            ));
        }
        if builtin.logging {
            pipeline.register(HookDefinition::post(ToolMatcher::Any, Arc::new(LoggingHook::new())));
        }

        let (pre, post) = pipeline.hook_names();
        tracing::info!(pre = pre.len(), post = post.len(), "Hook pipeline ready");
        Ok(pipeline)
    }
}
