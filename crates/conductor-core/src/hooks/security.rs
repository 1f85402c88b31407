//! Security reminder hook for file-editing tools
//!
//! Scans the path and new content of `Edit`, `Write`, and `MultiEdit` calls
//! for risky patterns. A call blocks when any rule it triggers has not yet
//! been reminded for that file this session, so the agent reads the reminder
//! and retries deliberately. Once every triggered rule was reminded the call
//! only warns (and the pipeline suppresses the repeated text).

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::types::{HookContext, HookMessage, HookVerdict, PreToolHook};

/// Tool names this hook inspects
pub const FILE_EDIT_TOOLS: &str = "Edit|Write|MultiEdit";

enum RuleCheck {
    Path(fn(&str) -> bool),
    Substrings(&'static [&'static str]),
}

struct SecurityRule {
    name: &'static str,
    check: RuleCheck,
    reminder: &'static str,
}

fn is_github_workflow(path: &str) -> bool {
    path.contains(".github/workflows/") && (path.ends_with(".yml") || path.ends_with(".yaml"))
}

static RULES: &[SecurityRule] = &[
    SecurityRule {
        name: "github_actions_workflow",
        check: RuleCheck::Path(is_github_workflow),
        reminder: "GitHub Actions workflow detected. Untrusted inputs such as issue titles, PR descriptions, and commit messages can inject commands. Pass them through env: variables instead of direct interpolation.",
    },
    SecurityRule {
        name: "child_process_exec",
        check: RuleCheck::Substrings(&["child_process.exec", "exec(", "execSync("]),
        reminder: "child_process.exec() can lead to command injection. Consider execFile() or another argument-vector API.",
    },
    SecurityRule {
        name: "eval_injection",
        check: RuleCheck::Substrings(&["eval(", "new Function("]),
        reminder: "eval() and new Function() execute arbitrary code. Use JSON.parse() or an explicit parser for data.",
    },
    SecurityRule {
        name: "dangerously_set_html",
        check: RuleCheck::Substrings(&["dangerouslySetInnerHTML"]),
        reminder: "dangerouslySetInnerHTML can lead to XSS. Sanitize the content first (e.g. DOMPurify).",
    },
    SecurityRule {
        name: "inner_html_xss",
        check: RuleCheck::Substrings(&[".innerHTML =", ".innerHTML="]),
        reminder: "Assigning untrusted content to innerHTML can lead to XSS. Use textContent or DOM construction.",
    },
    SecurityRule {
        name: "pickle_deserialization",
        check: RuleCheck::Substrings(&["pickle.load", "pickle.loads"]),
        reminder: "Unpickling untrusted data can execute arbitrary code. Use JSON or another safe format.",
    },
    SecurityRule {
        name: "os_system_injection",
        check: RuleCheck::Substrings(&["os.system(", "from os import system"]),
        reminder: "os.system() must only receive static arguments, never user-controlled input.",
    },
    SecurityRule {
        name: "sql_injection",
        check: RuleCheck::Substrings(&["execute(f\"", "execute(f'", ".format("]),
        reminder: "String formatting in SQL queries can lead to SQL injection. Use parameterized queries.",
    },
];

/// Text written by an edit tool call
fn written_content(tool: &str, input: &Value) -> String {
    let str_field = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    match tool {
        "Write" => str_field(input, "content"),
        "Edit" => str_field(input, "new_string"),
        "MultiEdit" => input
            .get("edits")
            .and_then(Value::as_array)
            .map(|edits| {
                edits
                    .iter()
                    .map(|e| str_field(e, "new_string"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Names of the rules a call triggers, in rule order
fn triggered_rules(path: &str, content: &str) -> Vec<&'static SecurityRule> {
    RULES
        .iter()
        .filter(|rule| match &rule.check {
            RuleCheck::Path(check) => check(path),
            RuleCheck::Substrings(subs) => {
                !content.is_empty() && subs.iter().any(|s| content.contains(s))
            }
        })
        .collect()
}

fn reminder(rule: &SecurityRule, key: String) -> HookMessage {
    HookMessage::keyed(format!("[{}] {}", rule.name, rule.reminder), key)
}

/// Blocks the first risky edit per `(file, rule)`, warns afterwards
#[derive(Default)]
pub struct SecurityReminderHook {
    reminded: Mutex<HashSet<String>>,
}

impl SecurityReminderHook {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreToolHook for SecurityReminderHook {
    fn name(&self) -> &str {
        "security-reminder"
    }

    async fn before_execute(
        &self,
        tool: &str,
        input: &Value,
        _ctx: &HookContext,
    ) -> Result<HookVerdict> {
        let path = input.get("file_path").and_then(Value::as_str).unwrap_or("");
        if path.is_empty() {
            return Ok(HookVerdict::Allow);
        }

        let content = written_content(tool, input);
        let rules = triggered_rules(path, &content);
        let Some(first) = rules.first() else {
            return Ok(HookVerdict::Allow);
        };

        // Block on the first rule not yet reminded for this file
        {
            let mut reminded = self.reminded.lock();
            for rule in &rules {
                let key = format!("{path}-{}", rule.name);
                if reminded.insert(key.clone()) {
                    tracing::info!(tool, path, rule = rule.name, "Security reminder raised");
                    return Ok(HookVerdict::Block(reminder(rule, key)));
                }
            }
        }

        Ok(HookVerdict::Warn(reminder(
            first,
            format!("{path}-{}", first.name),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::pipeline::HookPipeline;
    use crate::hooks::types::{HookDefinition, ToolMatcher};
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> HookContext {
        HookContext::default()
    }

    #[tokio::test]
    async fn blocks_eval_in_write() {
        let hook = SecurityReminderHook::new();
        let verdict = hook
            .before_execute("Write", &json!({"file_path": "a.js", "content": "eval(x)"}), &ctx())
            .await
            .unwrap();
        assert!(matches!(verdict, HookVerdict::Block(ref m) if m.text.contains("eval_injection")));
    }

    #[tokio::test]
    async fn second_hit_only_warns() {
        let hook = SecurityReminderHook::new();
        let input = json!({"file_path": "a.py", "content": "pickle.loads(blob)"});
        let first = hook.before_execute("Write", &input, &ctx()).await.unwrap();
        let second = hook.before_execute("Write", &input, &ctx()).await.unwrap();
        assert!(first.is_block());
        assert!(matches!(second, HookVerdict::Warn(_)));

        // Different file is a fresh reminder
        let other = json!({"file_path": "b.py", "content": "pickle.loads(blob)"});
        assert!(hook.before_execute("Write", &other, &ctx()).await.unwrap().is_block());
    }

    #[tokio::test]
    async fn new_rule_in_reminded_file_still_blocks() {
        let hook = SecurityReminderHook::new();
        let first = json!({"file_path": "x.js", "content": "execSync(cmd)"});
        let verdict = hook.before_execute("Write", &first, &ctx()).await.unwrap();
        assert!(matches!(verdict, HookVerdict::Block(ref m) if m.text.contains("child_process_exec")));

        let second = json!({"file_path": "x.js", "content": "execSync(cmd); eval(userInput)"});
        let verdict = hook.before_execute("Write", &second, &ctx()).await.unwrap();
        assert!(matches!(verdict, HookVerdict::Block(ref m) if m.text.contains("eval_injection")));

        // Both reminded now
        let verdict = hook.before_execute("Write", &second, &ctx()).await.unwrap();
        assert!(matches!(verdict, HookVerdict::Warn(ref m) if m.text.contains("child_process_exec")));
    }

    #[tokio::test]
    async fn workflow_path_rule() {
        let hook = SecurityReminderHook::new();
        let verdict = hook
            .before_execute(
                "Edit",
                &json!({"file_path": ".github/workflows/ci.yml", "new_string": "run: echo"}),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(verdict.is_block());
    }

    #[tokio::test]
    async fn multi_edit_content_is_joined() {
        let hook = SecurityReminderHook::new();
        let input = json!({
            "file_path": "db.py",
            "edits": [{"new_string": "x = 1"}, {"new_string": "cur.execute(f\"SELECT {x}\")"}]
        });
        assert!(hook.before_execute("MultiEdit", &input, &ctx()).await.unwrap().is_block());
    }

    #[tokio::test]
    async fn clean_content_allowed() {
        let hook = SecurityReminderHook::new();
        let verdict = hook
            .before_execute("Write", &json!({"file_path": "a.rs", "content": "fn main() {}"}), &ctx())
            .await
            .unwrap();
        assert_eq!(verdict, HookVerdict::Allow);
    }

    #[tokio::test]
    async fn pipeline_suppresses_repeat_reminder() {
        let mut pipeline = HookPipeline::new("s");
        pipeline.register(HookDefinition::pre(
            ToolMatcher::parse(FILE_EDIT_TOOLS),
            Arc::new(SecurityReminderHook::new()),
        ));
        let input = json!({"file_path": "x.js", "content": "el.innerHTML = html"});

        let first = pipeline.run_pre("Write", &input).await;
        assert!(!first.allowed);
        assert_eq!(first.notices.len(), 1);

        let second = pipeline.run_pre("Write", &input).await;
        assert!(second.allowed);
        assert!(second.notices.is_empty());
    }
}
