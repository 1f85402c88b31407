//! Planner response parsing
//!
//! The planner answers with free text that contains one JSON object:
//!
//! ```json
//! {
//!   "mode": "sequential",
//!   "steps": [{"id": "step1", "description": "..."}],
//!   "questions": [{"id": "q1", "question": "...", "choices": ["A", "B"],
//!                  "allow_custom": true, "default": "A", "category": "approach"}]
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::types::{ExecutionMode, InteractivePlan, PlanQuestion, PlanStep};

/// System prompt that asks the model for a plan in the format parsed below
pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a planning agent in INTERACTIVE PLAN MODE.

Analyze the request, design concrete steps, and list the decisions where the
user's preference matters. The questions are asked BEFORE anything runs.

Answer with one JSON object:
{
  "mode": "single" | "sequential" | "parallel",
  "steps": [{"id": "step1", "description": "What to do"}],
  "questions": [
    {"id": "q1", "question": "Which approach?", "choices": ["A", "B"],
     "allow_custom": true, "default": "A", "category": "approach"}
  ]
}

Categories: approach, implementation, testing, tools, scope.
Offer 2-4 concrete choices with a sensible default. Ask "which" or "how",
not yes/no."#;

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "prompt")]
    question: String,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default = "default_true")]
    allow_custom: bool,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Extract the outermost `{...}` span from model output
fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a planner response into an [`InteractivePlan`].
///
/// Missing fields fall back to defaults: mode `single`, question ids
/// `q<n>`, step ids `step<n>`, category `general`, custom answers allowed.
pub fn parse_planner_response(text: &str) -> Result<InteractivePlan> {
    let json = json_span(text).ok_or_else(|| anyhow!("no JSON object in planner response"))?;
    let raw: RawPlan =
        serde_json::from_str(json).context("planner response is not a valid plan object")?;

    let execution_mode = match raw.mode.as_deref() {
        None => ExecutionMode::Single,
        Some(m) => ExecutionMode::parse(m).unwrap_or_else(|| {
            tracing::debug!(mode = m, "Unknown plan mode, using single");
            ExecutionMode::Single
        }),
    };

    let steps = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| PlanStep {
            id: s.id.unwrap_or_else(|| format!("step{}", i + 1)),
            description: s.description,
        })
        .collect();

    let questions = raw
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| PlanQuestion {
            id: q.id.unwrap_or_else(|| format!("q{}", i + 1)),
            prompt: q.question,
            choices: q.choices,
            allow_custom_answer: q.allow_custom,
            default_choice: q.default,
            category: q
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "general".to_string()),
        })
        .collect();

    Ok(InteractivePlan::new(execution_mode, steps, questions)?)
}
