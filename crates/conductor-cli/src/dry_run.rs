//! Tool executor that runs nothing
//!
//! Reports what the model asked for so hook decisions can be inspected
//! without touching the workspace.

use async_trait::async_trait;
use serde_json::Value;

use conductor_core::orchestrator::ToolExecutor;

pub struct DryRunExecutor;

/// Short human form of a tool input
fn describe(input: &Value) -> String {
    for key in ["command", "file_path", "path", "pattern", "url"] {
        if let Some(v) = input.get(key).and_then(Value::as_str) {
            return format!("{key}={v}");
        }
    }
    match input {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ToolExecutor for DryRunExecutor {
    async fn execute(&self, name: &str, input: &Value) -> conductor_core::Result<String> {
        tracing::info!(tool = name, "Dry run");
        Ok(format!("[dry run] {name} {}", describe(input)).trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reports_the_interesting_field() {
        let out = DryRunExecutor
            .execute("bash", &json!({"command": "cargo fmt", "timeout": 10}))
            .await
            .unwrap();
        assert_eq!(out, "[dry run] bash command=cargo fmt");

        let out = DryRunExecutor.execute("noop", &Value::Null).await.unwrap();
        assert_eq!(out, "[dry run] noop");
    }
}
