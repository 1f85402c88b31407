//! Language model boundary
//!
//! These are NOT provider wire types. A provider adapter maps them onto its
//! own API; the core only needs text plus an optional tool-call request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Origin label, e.g. `command:execute-plan` or a tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn tool(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            name: Some(tool.into()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Everything a model sees for one call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl PromptContext {
    pub fn new(system: Option<String>, messages: Vec<ChatMessage>) -> Self {
        Self { system, messages }
    }

    /// Single user message with an optional system prompt
    pub fn single(system: Option<String>, user: impl Into<String>) -> Self {
        Self {
            system,
            messages: vec![ChatMessage::user(user)],
        }
    }
}

/// A tool the model asked to run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_call: None,
        }
    }

    pub fn with_tool_call(mut self, name: impl Into<String>, input: Value) -> Self {
        self.tool_call = Some(ToolCall {
            name: name.into(),
            input,
        });
        self
    }
}

/// External model capability. Failures surface as `ExternalService`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &PromptContext) -> Result<ModelResponse>;
}
