//! Interactive plan data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{OrchestrationError, Result};

/// Whether work starts immediately or after an interactive Q&A round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    #[default]
    Execution,
    Plan,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Execution => "execution",
            OperatingMode::Plan => "plan",
        }
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the plan's steps are meant to be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Single,
    Sequential,
    Parallel,
}

impl ExecutionMode {
    /// Parse a mode name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Some(ExecutionMode::Single),
            "sequential" => Some(ExecutionMode::Sequential),
            "parallel" => Some(ExecutionMode::Parallel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Single => "single",
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// A question the planner wants answered before execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanQuestion {
    pub id: String,
    pub prompt: String,
    /// Pre-determined choices, possibly empty
    pub choices: Vec<String>,
    pub allow_custom_answer: bool,
    pub default_choice: Option<String>,
    /// Grouping label, e.g. "approach" or "testing"
    pub category: String,
}

impl PlanQuestion {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            choices: Vec::new(),
            allow_custom_answer: true,
            default_choice: None,
            category: "general".to_string(),
        }
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, choice: impl Into<String>) -> Self {
        self.default_choice = Some(choice.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn allow_custom(mut self, allow: bool) -> Self {
        self.allow_custom_answer = allow;
        self
    }

    /// True if `value` is one of the listed choices
    pub fn is_choice(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAnswer {
    pub question_id: String,
    pub value: String,
    /// True when the user typed their own text instead of picking a choice
    pub is_custom: bool,
    pub answered_at: DateTime<Utc>,
}

/// Steps plus open questions awaiting human answers
///
/// Questions are fixed at construction. Answers can only be stored through
/// [`InteractivePlan::record_answer`], which rejects unknown question ids.
#[derive(Debug, Clone, Serialize)]
pub struct InteractivePlan {
    steps: Vec<PlanStep>,
    execution_mode: ExecutionMode,
    questions: Vec<PlanQuestion>,
    answers: HashMap<String, PlanAnswer>,
    created_at: DateTime<Utc>,
}

impl InteractivePlan {
    /// Build a plan; fails if two questions share an id
    pub fn new(
        execution_mode: ExecutionMode,
        steps: Vec<PlanStep>,
        questions: Vec<PlanQuestion>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for q in &questions {
            if !seen.insert(q.id.as_str()) {
                return Err(OrchestrationError::invalid_state(format!(
                    "duplicate question id '{}' in plan",
                    q.id
                )));
            }
        }

        Ok(Self {
            steps,
            execution_mode,
            questions,
            answers: HashMap::new(),
            created_at: Utc::now(),
        })
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn questions(&self) -> &[PlanQuestion] {
        &self.questions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn question(&self, id: &str) -> Option<&PlanQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn answer(&self, question_id: &str) -> Option<&PlanAnswer> {
        self.answers.get(question_id)
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Upsert an answer; last write wins
    pub fn record_answer(
        &mut self,
        question_id: &str,
        value: impl Into<String>,
        is_custom: bool,
    ) -> Result<()> {
        if self.question(question_id).is_none() {
            return Err(OrchestrationError::UnknownQuestion(question_id.to_string()));
        }
        self.answers.insert(
            question_id.to_string(),
            PlanAnswer {
                question_id: question_id.to_string(),
                value: value.into(),
                is_custom,
                answered_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Every question has an answer
    pub fn is_complete(&self) -> bool {
        self.questions
            .iter()
            .all(|q| self.answers.contains_key(&q.id))
    }

    /// Questions without an answer, in plan order
    pub fn unanswered(&self) -> Vec<&PlanQuestion> {
        self.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .collect()
    }

    /// Render steps and answered questions for the executor.
    ///
    /// Output depends only on plan content; answer timestamps are not included.
    pub fn to_context_string(&self) -> String {
        let mut lines = vec![
            "=== INTERACTIVE PLAN ===".to_string(),
            format!("Mode: {}", self.execution_mode.as_str()),
            String::new(),
            "Steps:".to_string(),
        ];
        for (i, step) in self.steps.iter().enumerate() {
            lines.push(format!("{}. [{}] {}", i + 1, step.id, step.description));
        }

        if !self.answers.is_empty() {
            lines.push(String::new());
            lines.push("User Preferences:".to_string());
            for q in &self.questions {
                if let Some(ans) = self.answers.get(&q.id) {
                    let custom = if ans.is_custom { " (custom)" } else { "" };
                    lines.push(format!("- [{}] {}", q.id, q.prompt));
                    lines.push(format!("  Answer: {}{}", ans.value, custom));
                }
            }
        }

        lines.join("\n")
    }
}
