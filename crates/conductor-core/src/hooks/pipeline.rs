//! Hook pipeline
//!
//! Runs every matching hook around a tool call, in registration order:
//!
//! ```text
//!   run_pre ──► hook₁ ──► hook₂ ──► ... ──► allowed? ──► tool ──► run_post ──► hook₁(out) ──► hook₂(out') ──► ...
//! ```
//!
//! - Pre hooks never short-circuit; `allowed` is false if any of them blocked.
//! - A hook error, panic, or timeout becomes a warning and never blocks.
//! - Post hooks can rewrite the output; a post-hook block is only a warning.
//! - Message text is shown once per `(hook, key)` per session.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use super::types::{
    HookAction, HookContext, HookDefinition, HookMessage, HookVerdict, PostHookOutcome,
    PostToolHook, PreToolHook, ToolMatcher,
};

/// Default per-hook budget
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Severity of a surfaced hook message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warn,
    Block,
}

/// A message surfaced by one hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookNotice {
    pub hook: String,
    pub level: NoticeLevel,
    pub message: String,
}

/// Aggregate result of all pre-tool hooks
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreToolReport {
    pub allowed: bool,
    /// Surfaced messages, registration order, after de-duplication
    pub notices: Vec<HookNotice>,
    /// Names of hooks that blocked, including ones whose text was suppressed
    pub blocked_by: Vec<String>,
}

impl PreToolReport {
    pub fn messages(&self) -> Vec<&str> {
        self.notices.iter().map(|n| n.message.as_str()).collect()
    }

    /// Blocking messages for the agent loop.
    ///
    /// Falls back to a short note per blocking hook when the text was
    /// already shown earlier in the session.
    pub fn agent_feedback(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Block)
            .map(|n| n.message.clone())
            .collect();
        for hook in &self.blocked_by {
            let shown = self
                .notices
                .iter()
                .any(|n| n.level == NoticeLevel::Block && &n.hook == hook);
            if !shown {
                out.push(format!("Blocked by hook '{hook}' (reason reported earlier)"));
            }
        }
        out
    }
}

/// Result of all post-tool hooks
#[derive(Debug, Clone, Serialize)]
pub struct PostToolReport {
    /// Output after every rewrite, in registration order
    pub output: String,
    pub notices: Vec<HookNotice>,
}

impl PostToolReport {
    pub fn messages(&self) -> Vec<&str> {
        self.notices.iter().map(|n| n.message.as_str()).collect()
    }
}

struct PreEntry {
    name: String,
    matcher: ToolMatcher,
    hook: Arc<dyn PreToolHook>,
}

struct PostEntry {
    name: String,
    matcher: ToolMatcher,
    hook: Arc<dyn PostToolHook>,
}

/// Ordered registry of pre/post hooks for one session
pub struct HookPipeline {
    pre: Vec<PreEntry>,
    post: Vec<PostEntry>,
    timeout: Duration,
    ctx: HookContext,
    shown: Mutex<HashSet<(String, String)>>,
}

impl Default for HookPipeline {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

impl HookPipeline {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            pre: Vec::new(),
            post: Vec::new(),
            timeout: DEFAULT_HOOK_TIMEOUT,
            ctx: HookContext {
                session_id: session_id.into(),
            },
            shown: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.ctx.session_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Append a hook; its phase comes from the action
    pub fn register(&mut self, def: HookDefinition) {
        tracing::debug!(hook = %def.name, matcher = ?def.matcher, pre = def.is_pre(), "Hook registered");
        match def.action {
            HookAction::Pre(hook) => self.pre.push(PreEntry {
                name: def.name,
                matcher: def.matcher,
                hook,
            }),
            HookAction::Post(hook) => self.post.push(PostEntry {
                name: def.name,
                matcher: def.matcher,
                hook,
            }),
        }
    }

    /// Registered hook names per phase
    pub fn hook_names(&self) -> (Vec<&str>, Vec<&str>) {
        (
            self.pre.iter().map(|e| e.name.as_str()).collect(),
            self.post.iter().map(|e| e.name.as_str()).collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    /// Forget which messages were shown
    pub fn reset_session_messages(&self) {
        self.shown.lock().clear();
    }

    /// True the first time `(hook, key)` is seen this session
    fn first_showing(&self, hook: &str, msg: &HookMessage) -> bool {
        self.shown
            .lock()
            .insert((hook.to_string(), msg.key().to_string()))
    }

    fn push_notice(
        &self,
        notices: &mut Vec<HookNotice>,
        hook: &str,
        level: NoticeLevel,
        msg: HookMessage,
    ) {
        if self.first_showing(hook, &msg) {
            notices.push(HookNotice {
                hook: hook.to_string(),
                level,
                message: msg.text,
            });
        } else {
            tracing::trace!(hook, key = msg.key(), "Repeated hook message suppressed");
        }
    }

    fn failure_message(&self, hook: &str, failure: HookFailure) -> HookMessage {
        match failure {
            HookFailure::TimedOut => HookMessage::keyed(
                format!(
                    "Hook '{}' timed out after {}ms",
                    hook,
                    self.timeout.as_millis()
                ),
                "hook timed out",
            ),
            HookFailure::Error(e) => HookMessage::new(format!("Hook '{hook}' failed: {e}")),
            HookFailure::Panicked => {
                HookMessage::keyed(format!("Hook '{hook}' panicked"), "hook panicked")
            }
        }
    }

    /// Run every matching pre-tool hook
    pub async fn run_pre(&self, tool: &str, input: &Value) -> PreToolReport {
        let mut report = PreToolReport {
            allowed: true,
            ..Default::default()
        };

        for entry in self.pre.iter().filter(|e| e.matcher.matches(tool, input)) {
            let call = entry.hook.before_execute(tool, input, &self.ctx);
            let verdict = match guarded(self.timeout, call).await {
                Ok(v) => v,
                Err(failure) => {
                    tracing::warn!(hook = %entry.name, tool, failure = ?failure, "Pre-tool hook failed");
                    HookVerdict::Warn(self.failure_message(&entry.name, failure))
                }
            };

            match verdict {
                HookVerdict::Allow => {}
                HookVerdict::Warn(msg) => {
                    self.push_notice(&mut report.notices, &entry.name, NoticeLevel::Warn, msg);
                }
                HookVerdict::Block(msg) => {
                    tracing::info!(hook = %entry.name, tool, reason = %msg.text, "Tool call blocked by hook");
                    report.allowed = false;
                    report.blocked_by.push(entry.name.clone());
                    self.push_notice(&mut report.notices, &entry.name, NoticeLevel::Block, msg);
                }
            }
        }

        report
    }

    /// Run every matching post-tool hook, threading the output through
    pub async fn run_post(&self, tool: &str, input: &Value, output: &str) -> PostToolReport {
        let mut current = output.to_string();
        let mut notices = Vec::new();

        for entry in self.post.iter().filter(|e| e.matcher.matches(tool, input)) {
            let call = entry.hook.after_execute(tool, input, &current, &self.ctx);
            let outcome = match guarded(self.timeout, call).await {
                Ok(o) => o,
                Err(failure) => {
                    tracing::warn!(hook = %entry.name, tool, failure = ?failure, "Post-tool hook failed");
                    PostHookOutcome::with_verdict(HookVerdict::Warn(
                        self.failure_message(&entry.name, failure),
                    ))
                }
            };

            if let Some(replacement) = outcome.replacement {
                tracing::debug!(hook = %entry.name, tool, "Tool output rewritten by hook");
                current = replacement;
            }
            match outcome.verdict {
                HookVerdict::Allow => {}
                HookVerdict::Warn(msg) | HookVerdict::Block(msg) => {
                    self.push_notice(&mut notices, &entry.name, NoticeLevel::Warn, msg);
                }
            }
        }

        PostToolReport {
            output: current,
            notices,
        }
    }
}

#[derive(Debug)]
enum HookFailure {
    TimedOut,
    Error(String),
    Panicked,
}

async fn guarded<T, F>(timeout: Duration, call: F) -> Result<T, HookFailure>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(call).catch_unwind()).await {
        Ok(Ok(Ok(v))) => Ok(v),
        Ok(Ok(Err(e))) => Err(HookFailure::Error(format!("{e:#}"))),
        Ok(Err(_)) => Err(HookFailure::Panicked),
        Err(_) => Err(HookFailure::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    struct SubstringBlock {
        needle: &'static str,
    }

    #[async_trait]
    impl PreToolHook for SubstringBlock {
        fn name(&self) -> &str {
            "substring-block"
        }

        async fn before_execute(
            &self,
            _tool: &str,
            input: &Value,
            _ctx: &HookContext,
        ) -> anyhow::Result<HookVerdict> {
            let content = input.get("content").and_then(|v| v.as_str()).unwrap_or("");
            if content.contains(self.needle) {
                return Ok(HookVerdict::block(format!("'{}' is not allowed", self.needle)));
            }
            Ok(HookVerdict::Allow)
        }
    }

    struct Fixed(&'static str, HookVerdict);

    #[async_trait]
    impl PreToolHook for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn before_execute(
            &self,
            _tool: &str,
            _input: &Value,
            _ctx: &HookContext,
        ) -> anyhow::Result<HookVerdict> {
            Ok(self.1.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl PreToolHook for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn before_execute(
            &self,
            _tool: &str,
            _input: &Value,
            _ctx: &HookContext,
        ) -> anyhow::Result<HookVerdict> {
            Err(anyhow!("config missing"))
        }
    }

    struct Sleepy;

    #[async_trait]
    impl PreToolHook for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn before_execute(
            &self,
            _tool: &str,
            _input: &Value,
            _ctx: &HookContext,
        ) -> anyhow::Result<HookVerdict> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(HookVerdict::block("too late"))
        }
    }

    struct Append(&'static str);

    #[async_trait]
    impl PostToolHook for Append {
        fn name(&self) -> &str {
            self.0
        }

        async fn after_execute(
            &self,
            _tool: &str,
            _input: &Value,
            output: &str,
            _ctx: &HookContext,
        ) -> anyhow::Result<PostHookOutcome> {
            Ok(PostHookOutcome::rewrite(format!("{output}{}", self.0)))
        }
    }

    struct PostBlock;

    #[async_trait]
    impl PostToolHook for PostBlock {
        fn name(&self) -> &str {
            "post-block"
        }

        async fn after_execute(
            &self,
            _tool: &str,
            _input: &Value,
            _output: &str,
            _ctx: &HookContext,
        ) -> anyhow::Result<PostHookOutcome> {
            Ok(PostHookOutcome::with_verdict(HookVerdict::block("too late to block")))
        }
    }

    fn pipeline_with(defs: Vec<HookDefinition>) -> HookPipeline {
        let mut pipeline = HookPipeline::new("test-session");
        for def in defs {
            pipeline.register(def);
        }
        pipeline
    }

    #[tokio::test]
    async fn eval_block_scenario() {
        let pipeline = pipeline_with(vec![HookDefinition::pre(
            ToolMatcher::Any,
            Arc::new(SubstringBlock { needle: "eval(" }),
        )]);

        let blocked = pipeline.run_pre("Write", &json!({"content": "eval(x)"})).await;
        assert!(!blocked.allowed);
        assert_eq!(blocked.messages().len(), 1);

        let ok = pipeline.run_pre("Write", &json!({"content": "safe"})).await;
        assert!(ok.allowed);
        assert!(ok.messages().is_empty());
    }

    #[tokio::test]
    async fn block_does_not_short_circuit() {
        let pipeline = pipeline_with(vec![
            HookDefinition::pre(ToolMatcher::Any, Arc::new(Fixed("a", HookVerdict::warn("first")))),
            HookDefinition::pre(ToolMatcher::Any, Arc::new(Fixed("b", HookVerdict::block("second")))),
            HookDefinition::pre(ToolMatcher::Any, Arc::new(Fixed("c", HookVerdict::warn("third")))),
            HookDefinition::pre(ToolMatcher::Any, Arc::new(Fixed("d", HookVerdict::Allow))),
        ]);

        let report = pipeline.run_pre("bash", &json!({})).await;
        assert!(!report.allowed);
        assert_eq!(report.messages(), vec!["first", "second", "third"]);
        assert_eq!(report.blocked_by, vec!["b".to_string()]);
        assert_eq!(report.agent_feedback(), vec!["second".to_string()]);
    }

    #[tokio::test]
    async fn non_matching_hooks_are_skipped() {
        let pipeline = pipeline_with(vec![HookDefinition::pre(
            ToolMatcher::parse("Edit|Write"),
            Arc::new(Fixed("edit-only", HookVerdict::block("no"))),
        )]);

        let report = pipeline.run_pre("Read", &json!({})).await;
        assert!(report.allowed);
        assert!(report.notices.is_empty());
    }

    #[tokio::test]
    async fn hook_error_becomes_warning() {
        let pipeline = pipeline_with(vec![HookDefinition::pre(ToolMatcher::Any, Arc::new(Failing))]);

        let report = pipeline.run_pre("bash", &json!({})).await;
        assert!(report.allowed);
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].level, NoticeLevel::Warn);
        assert!(report.notices[0].message.contains("config missing"));
    }

    #[tokio::test]
    async fn timed_out_hook_warns_and_never_blocks() {
        let pipeline = pipeline_with(vec![HookDefinition::pre(ToolMatcher::Any, Arc::new(Sleepy))])
            .with_timeout(Duration::from_millis(50));

        let report = pipeline.run_pre("bash", &json!({})).await;
        assert!(report.allowed);
        assert_eq!(report.notices.len(), 1);
        assert!(report.notices[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn repeated_message_suppressed_but_still_enforced() {
        let pipeline = pipeline_with(vec![HookDefinition::pre(
            ToolMatcher::Any,
            Arc::new(SubstringBlock { needle: "eval(" }),
        )]);
        let input = json!({"content": "eval(y)"});

        let first = pipeline.run_pre("Write", &input).await;
        let second = pipeline.run_pre("Write", &input).await;

        assert!(!first.allowed);
        assert_eq!(first.notices.len(), 1);
        assert!(!second.allowed);
        assert!(second.notices.is_empty());
        assert_eq!(second.agent_feedback().len(), 1);

        pipeline.reset_session_messages();
        assert_eq!(pipeline.run_pre("Write", &input).await.notices.len(), 1);
    }

    #[tokio::test]
    async fn dedup_is_per_hook_identity() {
        let pipeline = pipeline_with(vec![
            HookDefinition::pre(ToolMatcher::Any, Arc::new(Fixed("a", HookVerdict::warn("same")))),
            HookDefinition::pre(ToolMatcher::Any, Arc::new(Fixed("b", HookVerdict::warn("same")))),
        ]);

        let report = pipeline.run_pre("x", &json!({})).await;
        assert_eq!(report.notices.len(), 2);
    }

    #[tokio::test]
    async fn post_hooks_rewrite_in_order() {
        let pipeline = pipeline_with(vec![
            HookDefinition::post(ToolMatcher::Any, Arc::new(Append("-a"))),
            HookDefinition::post(ToolMatcher::Any, Arc::new(Append("-b"))),
        ]);

        let report = pipeline.run_post("bash", &json!({}), "out").await;
        assert_eq!(report.output, "out-a-b");
    }

    #[tokio::test]
    async fn post_block_is_reported_as_warning() {
        let pipeline = pipeline_with(vec![
            HookDefinition::post(ToolMatcher::Any, Arc::new(PostBlock)),
            HookDefinition::post(ToolMatcher::Any, Arc::new(Append("!"))),
        ]);

        let report = pipeline.run_post("bash", &json!({}), "done").await;
        assert_eq!(report.output, "done!");
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].level, NoticeLevel::Warn);
    }
}
