//! Configuration
//!
//! `~/.conductor/config.toml`:
//!
//! ```toml
//! confidence_threshold = 80
//! hook_timeout_secs = 10
//! agent_timeout_secs = 300
//! max_parallel_agents = 3
//!
//! [builtin_hooks]
//! shell_guard = true
//!
//! [redaction]
//! patterns = ["acct-[0-9]{6}"]
//!
//! [[hooks.pre_tool_use]]
//! matcher = "Write|Edit"
//! command = "$HOME/bin/check-write"
//! ```
//!
//! Claude-style `hooks.json` files are also accepted and merged in:
//!
//! ```json
//! {"hooks": {"PreToolUse": [{"matcher": "Bash", "hooks": [{"type": "command", "command": "..."}]}]}}
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchConfig, DEFAULT_CONFIDENCE_THRESHOLD};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Minimum confidence for surfaced review findings
    pub confidence_threshold: u8,
    pub hook_timeout_secs: u64,
    pub agent_timeout_secs: u64,
    /// 0 means unbounded
    pub max_parallel_agents: usize,
    pub builtin_hooks: BuiltinHooks,
    pub redaction: RedactionConfig,
    pub hooks: HooksConfig,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            hook_timeout_secs: 10,
            agent_timeout_secs: 300,
            max_parallel_agents: 3,
            builtin_hooks: BuiltinHooks::default(),
            redaction: RedactionConfig::default(),
            hooks: HooksConfig::default(),
        }
    }
}

/// Toggles for the bundled hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinHooks {
    pub security_reminder: bool,
    pub shell_guard: bool,
    pub redaction: bool,
    pub logging: bool,
}

impl Default for BuiltinHooks {
    fn default() -> Self {
        Self {
            security_reminder: true,
            shell_guard: true,
            redaction: true,
            logging: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Extra regexes whose matches are replaced in tool output
    pub patterns: Vec<String>,
}

/// A shell command hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHookConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Tool matcher; `*` for every tool
    #[serde(default = "default_matcher")]
    pub matcher: String,
    pub command: String,
}

fn default_matcher() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub pre_tool_use: Vec<CommandHookConfig>,
    pub post_tool_use: Vec<CommandHookConfig>,
}

impl HooksConfig {
    pub fn len(&self) -> usize {
        self.pre_tool_use.len() + self.post_tool_use.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConductorConfig {
    /// Load from a TOML file; a missing file yields defaults
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        config.expand_commands();

        tracing::info!(
            hooks = config.hooks.len(),
            threshold = config.confidence_threshold,
            "Loaded config from {:?}",
            path
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.confidence_threshold > 100 {
            anyhow::bail!(
                "confidence_threshold must be within 0..=100, got {}",
                config.confidence_threshold
            );
        }
        Ok(config)
    }

    /// Merge a Claude-style hooks.json file if it exists.
    ///
    /// Returns the number of hooks added.
    pub async fn merge_hooks_json(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let file: ClaudeHooksFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        let mut added = 0;
        for (event, groups) in file.hooks {
            let target = match event.as_str() {
                "PreToolUse" => &mut self.hooks.pre_tool_use,
                "PostToolUse" => &mut self.hooks.post_tool_use,
                other => {
                    tracing::debug!(event = other, "Ignoring unsupported hook event");
                    continue;
                }
            };
            for group in groups {
                for entry in group.hooks.into_iter().filter(|h| h.kind == "command") {
                    target.push(CommandHookConfig {
                        name: None,
                        matcher: group.matcher.clone(),
                        command: expand_env_vars(&entry.command),
                    });
                    added += 1;
                }
            }
        }

        tracing::info!(added, "Merged hooks from {:?}", path);
        Ok(added)
    }

    fn expand_commands(&mut self) {
        for hook in self
            .hooks
            .pre_tool_use
            .iter_mut()
            .chain(self.hooks.post_tool_use.iter_mut())
        {
            hook.command = expand_env_vars(&hook.command);
        }
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            task_timeout: Duration::from_secs(self.agent_timeout_secs),
            max_concurrency: (self.max_parallel_agents > 0).then_some(self.max_parallel_agents),
            confidence_threshold: self.confidence_threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaudeHooksFile {
    #[serde(default)]
    hooks: HashMap<String, Vec<ClaudeHookGroup>>,
}

#[derive(Debug, Deserialize)]
struct ClaudeHookGroup {
    #[serde(default = "default_matcher")]
    matcher: String,
    #[serde(default)]
    hooks: Vec<ClaudeHookEntry>,
}

#[derive(Debug, Deserialize)]
struct ClaudeHookEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    command: String,
}

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Expand `$VAR` and `${VAR}`; unset variables are left as written
pub fn expand_env_vars(s: &str) -> String {
    ENV_VAR
        .replace_all(s, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
