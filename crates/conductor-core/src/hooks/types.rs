//! Hook traits, verdicts, and matchers

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

/// Text a hook wants shown, with an optional de-duplication key.
///
/// Within one session a `(hook name, key)` pair is shown at most once.
/// When no key is given the text itself is the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookMessage {
    pub text: String,
    pub dedup_key: Option<String>,
}

impl HookMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dedup_key: None,
        }
    }

    pub fn keyed(text: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dedup_key: Some(key.into()),
        }
    }

    pub fn key(&self) -> &str {
        self.dedup_key.as_deref().unwrap_or(&self.text)
    }
}

/// Outcome of one hook invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    /// Proceed silently
    Allow,
    /// Proceed, tell the operator
    Warn(HookMessage),
    /// Do not run the tool; tell the operator and the agent
    Block(HookMessage),
}

impl HookVerdict {
    pub fn warn(text: impl Into<String>) -> Self {
        Self::Warn(HookMessage::new(text))
    }

    pub fn block(text: impl Into<String>) -> Self {
        Self::Block(HookMessage::new(text))
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

/// What a post-tool hook returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostHookOutcome {
    pub verdict: HookVerdict,
    /// Replacement tool output seen by later hooks and the caller
    pub replacement: Option<String>,
}

impl PostHookOutcome {
    pub fn allow() -> Self {
        Self {
            verdict: HookVerdict::Allow,
            replacement: None,
        }
    }

    pub fn rewrite(output: impl Into<String>) -> Self {
        Self {
            verdict: HookVerdict::Allow,
            replacement: Some(output.into()),
        }
    }

    pub fn with_verdict(verdict: HookVerdict) -> Self {
        Self {
            verdict,
            replacement: None,
        }
    }
}

/// Session facts handed to every hook
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub session_id: String,
}

/// Hook called before tool execution
#[async_trait]
pub trait PreToolHook: Send + Sync {
    /// Stable identity used for logging and message de-duplication
    fn name(&self) -> &str;

    /// Errors are reported as warnings by the pipeline
    async fn before_execute(
        &self,
        tool: &str,
        input: &Value,
        ctx: &HookContext,
    ) -> Result<HookVerdict>;
}

/// Hook called after tool execution
#[async_trait]
pub trait PostToolHook: Send + Sync {
    fn name(&self) -> &str;

    /// May rewrite `output`; cannot veto a call that already ran
    async fn after_execute(
        &self,
        tool: &str,
        input: &Value,
        output: &str,
        ctx: &HookContext,
    ) -> Result<PostHookOutcome>;
}

type MatchFn = dyn Fn(&str, &Value) -> bool + Send + Sync;

/// Predicate over `(tool name, tool input)`
#[derive(Clone)]
pub enum ToolMatcher {
    Any,
    /// Exact tool names
    Names(Vec<String>),
    /// Anchored regex over the tool name
    Pattern(Regex),
    Custom(Arc<MatchFn>),
}

impl ToolMatcher {
    /// Parse a matcher string.
    ///
    /// `*` or empty matches everything. `Edit|Write` style lists of plain
    /// names match exactly. Anything else is an anchored regex, falling back
    /// to a literal name when it does not compile.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" {
            return ToolMatcher::Any;
        }

        let is_plain_list = pattern
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '|');
        if is_plain_list {
            return ToolMatcher::Names(
                pattern.split('|')
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            );
        }

        match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) => ToolMatcher::Pattern(re),
            Err(e) => {
                tracing::warn!(matcher = pattern, error = %e, "Invalid hook matcher, using literal name");
                ToolMatcher::Names(vec![pattern.to_string()])
            }
        }
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolMatcher::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn custom(f: impl Fn(&str, &Value) -> bool + Send + Sync + 'static) -> Self {
        ToolMatcher::Custom(Arc::new(f))
    }

    pub fn matches(&self, tool: &str, input: &Value) -> bool {
        match self {
            ToolMatcher::Any => true,
            ToolMatcher::Names(names) => names.iter().any(|n| n == tool),
            ToolMatcher::Pattern(re) => re.is_match(tool),
            ToolMatcher::Custom(f) => f(tool, input),
        }
    }
}

impl fmt::Debug for ToolMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolMatcher::Any => f.write_str("Any"),
            ToolMatcher::Names(n) => f.debug_tuple("Names").field(n).finish(),
            ToolMatcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            ToolMatcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which phase a hook runs in, carrying the hook itself
#[derive(Clone)]
pub enum HookAction {
    Pre(Arc<dyn PreToolHook>),
    Post(Arc<dyn PostToolHook>),
}

/// A typed registration: name, matcher, and action
#[derive(Clone)]
pub struct HookDefinition {
    pub name: String,
    pub matcher: ToolMatcher,
    pub action: HookAction,
}

impl HookDefinition {
    pub fn pre(matcher: ToolMatcher, hook: Arc<dyn PreToolHook>) -> Self {
        Self {
            name: hook.name().to_string(),
            matcher,
            action: HookAction::Pre(hook),
        }
    }

    pub fn post(matcher: ToolMatcher, hook: Arc<dyn PostToolHook>) -> Self {
        Self {
            name: hook.name().to_string(),
            matcher,
            action: HookAction::Post(hook),
        }
    }

    /// Override the registered name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_pre(&self) -> bool {
        matches!(self.action, HookAction::Pre(_))
    }
}

impl fmt::Debug for HookDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDefinition")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .field("phase", &if self.is_pre() { "pre" } else { "post" })
            .finish()
    }
}
