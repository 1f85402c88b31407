//! Language-model backed agent invoker
//!
//! Builds a role-specific prompt for each task, calls the model once, and
//! extracts the structured parts the workflow keeps.

use std::sync::Arc;

use async_trait::async_trait;

use super::extract::{extract_architect_assessment, extract_key_files, extract_review_issues};
use super::types::{AgentInvoker, AgentOutput, AgentRole, AgentTask};
use crate::error::Result;
use crate::orchestrator::llm::{LanguageModel, PromptContext};

const EXPLORER_PROMPT: &str = "\
You are an expert code analyst tracing how a feature is implemented, from entry points \
through every abstraction layer down to storage.

Report entry points with file:line references, the execution flow, key components, \
architecture patterns, and dependencies.

Format your response as:
## Analysis
...
## Key Files to Read
1. path/to/file.ext:line - Reason
## Summary
...";

const ARCHITECT_PROMPT: &str = "\
You are an expert software architect designing a concrete implementation approach that \
fits the existing codebase.

Cover the files to create or modify, key design decisions, and trade-offs.

Format your response as:
## Approach: <name>
## Files to Modify/Create
## Key Design Decisions
## Trade-offs
## Complexity: <1-5>
## Effort: <small/medium/large>
## Risk: <low/medium/high>";

const REVIEWER_PROMPT: &str = "\
You are an expert code reviewer. Report only real issues through your assigned lens and \
score each one 0-100 for confidence that it is real.

Format each issue as:
#### Issue N: <brief description>
- **Location**: `path/to/file.ext:line`
- **Severity**: low/medium/high/critical
- **Confidence**: 0-100
- **Suggestion**: how to fix

If nothing is wrong, say: No issues found in this review pass.";

fn system_prompt(role: AgentRole) -> Option<&'static str> {
    match role {
        AgentRole::Explorer => Some(EXPLORER_PROMPT),
        AgentRole::Architect => Some(ARCHITECT_PROMPT),
        AgentRole::Reviewer => Some(REVIEWER_PROMPT),
        AgentRole::General => None,
    }
}

fn user_prompt(task: &AgentTask) -> String {
    match task.role {
        AgentRole::Explorer | AgentRole::General if task.context.is_empty() => task.focus.clone(),
        AgentRole::Explorer | AgentRole::General => {
            format!("Context:\n{}\n\n{}", task.context, task.focus)
        }
        AgentRole::Architect => format!(
            "{}\n\nDesign approach: {}\n\nProvide a detailed architecture design following this approach.",
            task.context, task.focus
        ),
        AgentRole::Reviewer => format!(
            "Review scope:\n{}\n\nReview focus: {}\n\nScore confidence for each issue.",
            task.context, task.focus
        ),
    }
}

/// Runs each task as a single model call
pub struct ModelAgentInvoker {
    model: Arc<dyn LanguageModel>,
}

impl ModelAgentInvoker {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl AgentInvoker for ModelAgentInvoker {
    async fn invoke(&self, task: &AgentTask) -> Result<AgentOutput> {
        let prompt = PromptContext::single(
            system_prompt(task.role).map(str::to_string),
            user_prompt(task),
        );
        let response = self.model.invoke(&prompt).await?;
        let text = response.text;

        let mut output = AgentOutput::default();
        match task.role {
            AgentRole::Explorer => output.key_files = extract_key_files(&text),
            AgentRole::Architect => output.assessment = Some(extract_architect_assessment(&text)),
            AgentRole::Reviewer => output.findings = extract_review_issues(&text),
            AgentRole::General => {}
        }
        tracing::debug!(
            role = task.role.as_str(),
            findings = output.findings.len(),
            key_files = output.key_files.len(),
            "Agent response parsed"
        );
        output.text = text;
        Ok(output)
    }
}
