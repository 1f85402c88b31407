//! Agent task and result types
//!
//! Core types for parallel agent tasks, review findings, and per-task results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What kind of analysis an agent performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Traces existing code and lists key files
    Explorer,
    /// Proposes an implementation approach
    Architect,
    /// Reports issues with confidence scores
    Reviewer,
    #[default]
    General,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Explorer => "explorer",
            AgentRole::Architect => "architect",
            AgentRole::Reviewer => "reviewer",
            AgentRole::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explorer" => Some(AgentRole::Explorer),
            "architect" => Some(AgentRole::Architect),
            "reviewer" => Some(AgentRole::Reviewer),
            "general" => Some(AgentRole::General),
            _ => None,
        }
    }

    /// Focus descriptions used when the caller supplies none
    pub fn default_focuses(&self) -> &'static [&'static str] {
        match self {
            AgentRole::Explorer => &[
                "Find features similar to the goal and trace their implementation",
                "Map the architecture and abstractions around the affected area",
            ],
            AgentRole::Architect => &["minimal", "clean", "pragmatic"],
            AgentRole::Reviewer => &["simplicity", "bugs", "conventions"],
            AgentRole::General => &[],
        }
    }
}

/// One independent unit of analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    /// What this agent should concentrate on
    pub focus: String,
    /// Shared material handed to every agent in a dispatch
    pub context: String,
    pub role: AgentRole,
    /// Display name; derived from role and position when absent
    pub name: Option<String>,
}

impl AgentTask {
    pub fn new(focus: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            focus: focus.into(),
            context: context.into(),
            role: AgentRole::General,
            name: None,
        }
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name shown in results and logs
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.role.as_str(), index + 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lenient parse; looks for a severity word anywhere in the text
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();
        if s.contains("critical") {
            Some(Severity::Critical)
        } else if s.contains("high") {
            Some(Severity::High)
        } else if s.contains("medium") {
            Some(Severity::Medium)
        } else if s.contains("low") {
            Some(Severity::Low)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A single reviewer-reported issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub location: String,
    pub severity: Severity,
    /// 0..=100
    pub confidence: u8,
    pub description: String,
    pub suggested_fix: Option<String>,
}

impl Finding {
    pub fn new(
        location: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        confidence: u8,
    ) -> Self {
        Self {
            location: location.into(),
            severity,
            confidence: confidence.min(100),
            description: description.into(),
            suggested_fix: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// Architect self-assessment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectAssessment {
    /// 1..=5
    pub complexity: Option<u8>,
    /// small, medium, or large
    pub effort: Option<String>,
    /// low, medium, or high
    pub risk: Option<String>,
}

/// What an invoker returns for one task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutput {
    pub text: String,
    pub findings: Vec<Finding>,
    pub key_files: Vec<String>,
    pub assessment: Option<ArchitectAssessment>,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }
}

/// Result slot for one task, addressed by its input index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub source_task_index: usize,
    pub agent_name: String,
    pub role: AgentRole,
    pub output: String,
    pub findings: Vec<Finding>,
    pub key_files: Vec<String>,
    pub assessment: Option<ArchitectAssessment>,
    /// Set when the task failed or timed out; findings are then empty
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl AgentResult {
    pub fn success(
        index: usize,
        task: &AgentTask,
        output: AgentOutput,
        duration_ms: u64,
    ) -> Self {
        Self {
            source_task_index: index,
            agent_name: task.display_name(index),
            role: task.role,
            output: output.text,
            findings: output.findings,
            key_files: output.key_files,
            assessment: output.assessment,
            error: None,
            duration_ms,
        }
    }

    pub fn failure(
        index: usize,
        task: &AgentTask,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            source_task_index: index,
            agent_name: task.display_name(index),
            role: task.role,
            output: String::new(),
            findings: Vec::new(),
            key_files: Vec::new(),
            assessment: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// External capability that runs one agent task
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, task: &AgentTask) -> Result<AgentOutput>;
}
