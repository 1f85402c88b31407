//! Offline language models for the shell
//!
//! `ReplayModel` answers from a JSON file of canned responses, which makes
//! sessions reproducible. `EchoModel` is the fallback when no file is given.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use conductor_core::orchestrator::{LanguageModel, ModelResponse, PromptContext, Role};
use conductor_core::OrchestrationError;

/// One replay entry: bare text or a full response with a tool call
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayEntry {
    Text(String),
    Response(ModelResponse),
}

impl From<ReplayEntry> for ModelResponse {
    fn from(entry: ReplayEntry) -> Self {
        match entry {
            ReplayEntry::Text(text) => ModelResponse::text(text),
            ReplayEntry::Response(response) => response,
        }
    }
}

/// Serves canned responses in order, then fails
pub struct ReplayModel {
    responses: Mutex<VecDeque<ModelResponse>>,
}

impl ReplayModel {
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<ReplayEntry> =
            serde_json::from_str(content).context("replay file must be a JSON array")?;
        Ok(Self {
            responses: Mutex::new(entries.into_iter().map(ModelResponse::from).collect()),
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read replay file {:?}", path))?;
        let model = Self::from_json(&content)
            .with_context(|| format!("Failed to parse replay file {:?}", path))?;
        tracing::info!(
            responses = model.responses.lock().await.len(),
            "Loaded replay from {:?}",
            path
        );
        Ok(model)
    }

    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

#[async_trait]
impl LanguageModel for ReplayModel {
    async fn invoke(&self, _prompt: &PromptContext) -> conductor_core::Result<ModelResponse> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| OrchestrationError::external("replay exhausted"))
    }
}

/// Repeats the last user message back
pub struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn invoke(&self, prompt: &PromptContext) -> conductor_core::Result<ModelResponse> {
        let last = prompt
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(ModelResponse::text(format!("(offline) {last}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn replays_text_and_tool_calls_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"["hello", {{"text": "running", "tool_call": {{"name": "bash", "input": {{"command": "ls"}}}}}}]"#
        )
        .unwrap();

        let model = ReplayModel::load(file.path()).await.unwrap();
        assert_eq!(model.remaining().await, 2);

        let prompt = PromptContext::default();
        assert_eq!(model.invoke(&prompt).await.unwrap().text, "hello");
        let second = model.invoke(&prompt).await.unwrap();
        assert_eq!(second.tool_call.unwrap().name, "bash");

        let err = model.invoke(&prompt).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::ExternalService(_)));
    }

    #[tokio::test]
    async fn missing_or_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplayModel::load(&dir.path().join("none.json")).await.is_err());
        assert!(ReplayModel::from_json(r#"{"text": "not an array"}"#).is_err());
    }

    #[tokio::test]
    async fn echo_repeats_last_user_message() {
        let prompt = PromptContext::single(None, "hi there");
        let response = EchoModel.invoke(&prompt).await.unwrap();
        assert_eq!(response.text, "(offline) hi there");
        assert!(response.tool_call.is_none());
    }
}
