//! Parallel agents for workflow phases
//!
//! Exploration, architecture, and review phases fan out to several agents.
//! Results land in the phase's data so later phases can read them back with
//! `phase_data_at`.

use serde::Serialize;
use serde_json::{json, Value};

use super::manager::WorkflowManager;
use crate::dispatch::{
    aggregate_review, format_review_report, AgentInvoker, AgentResult, AgentRole, AgentTask,
    Finding, ParallelAgentDispatcher,
};
use crate::error::{OrchestrationError, Result};
use crate::events::Notification;

/// Phase data keys written by [`run_phase_agents`]
pub const AGENT_RESULTS_KEY: &str = "agent_results";
pub const KEY_FILES_KEY: &str = "key_files";
pub const FINDINGS_KEY: &str = "findings";

/// What one phase's agents produced
#[derive(Debug, Clone)]
pub struct PhaseAgentRun {
    pub phase: usize,
    pub role: AgentRole,
    pub results: Vec<AgentResult>,
    /// Explorer key files, merged across agents
    pub key_files: Vec<String>,
    /// Reviewer findings after confidence filtering and de-duplication
    pub findings: Vec<Finding>,
    pub suppressed: usize,
}

impl PhaseAgentRun {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

/// Tasks built from the role's default focuses
pub fn default_tasks_for(role: AgentRole, goal: &str, context: &str) -> Vec<AgentTask> {
    role.default_focuses()
        .iter()
        .map(|focus| {
            let task = match role {
                AgentRole::Explorer => AgentTask::new(
                    format!("{focus}. Feature goal: {goal}"),
                    context.to_string(),
                ),
                AgentRole::Architect => AgentTask::new(
                    *focus,
                    format!("Feature to build:\n{goal}\n\nCodebase context:\n{context}"),
                ),
                AgentRole::Reviewer if !goal.is_empty() => {
                    AgentTask::new(*focus, format!("Feature goal: {goal}\n\n{context}"))
                }
                _ => AgentTask::new(*focus, context.to_string()),
            };
            task.with_role(role)
                .with_name(format!("{}-{}", role.as_str(), focus_slug(focus)))
        })
        .collect()
}

fn focus_slug(focus: &str) -> String {
    let word = focus.split_whitespace().next().unwrap_or("task");
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase()
}

/// Key files stored by any phase before the current one, first-seen order
pub fn earlier_key_files(workflow: &WorkflowManager) -> Vec<String> {
    let current = workflow.current_index().unwrap_or(0);
    let mut files: Vec<String> = Vec::new();
    for index in 0..current {
        let Some(Value::Array(items)) = workflow.phase_data_at(index, KEY_FILES_KEY) else {
            continue;
        };
        for item in items.iter().filter_map(Value::as_str) {
            if !files.iter().any(|f| f == item) {
                files.push(item.to_string());
            }
        }
    }
    files
}

/// Values the previous phase stored, other than agent output
fn previous_phase_notes(workflow: &WorkflowManager) -> Option<String> {
    let previous = workflow.current_index()?.checked_sub(1)?;
    let name = workflow.run()?.template().phase(previous)?.name.clone();
    let lines: Vec<String> = workflow
        .phase_data_entries(previous)
        .into_iter()
        .filter(|(key, _)| ![AGENT_RESULTS_KEY, KEY_FILES_KEY, FINDINGS_KEY].contains(key))
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect();
    (!lines.is_empty()).then(|| format!("{name} notes:\n{}", lines.join("\n")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| OrchestrationError::invalid_state(format!("phase data not serializable: {e}")))
}

/// Dispatch the current phase's agents and store what they return.
///
/// With no `tasks`, the role's default focuses are used with the workflow
/// goal and earlier key files as context. Reviewers also get whatever the
/// previous phase stored. Task roles are forced to the phase's role.
pub async fn run_phase_agents(
    workflow: &mut WorkflowManager,
    dispatcher: &ParallelAgentDispatcher,
    invoker: &dyn AgentInvoker,
    tasks: Vec<AgentTask>,
) -> Result<PhaseAgentRun> {
    if !workflow.is_active() {
        return Err(OrchestrationError::NoActiveWorkflow);
    }
    let phase = workflow.current_phase()?.clone();
    let role = phase.agent_role.ok_or_else(|| {
        OrchestrationError::invalid_state(format!(
            "phase {} ({}) does not run agents",
            phase.index + 1,
            phase.name
        ))
    })?;

    let tasks: Vec<AgentTask> = if tasks.is_empty() {
        let goal = workflow.run().map(|r| r.goal().to_string()).unwrap_or_default();
        let files = earlier_key_files(workflow);
        let mut sections = Vec::new();
        if !files.is_empty() {
            sections.push(format!("Key files:\n{}", files.join("\n")));
        }
        if role == AgentRole::Reviewer {
            sections.extend(previous_phase_notes(workflow));
        }
        default_tasks_for(role, &goal, &sections.join("\n\n"))
    } else {
        tasks.into_iter().map(|t| t.with_role(role)).collect()
    };

    tracing::info!(phase = phase.index, role = role.as_str(), agents = tasks.len(), "Running phase agents");
    let results = dispatcher.dispatch(&tasks, invoker).await;

    let mut run = PhaseAgentRun {
        phase: phase.index,
        role,
        results: Vec::new(),
        key_files: Vec::new(),
        findings: Vec::new(),
        suppressed: 0,
    };

    let summary = match role {
        AgentRole::Reviewer => {
            let report = aggregate_review(results, dispatcher.config().confidence_threshold);
            workflow.store_phase_data(FINDINGS_KEY, to_value(&report.findings)?)?;
            let text = format_review_report(&report);
            run.findings = report.findings;
            run.suppressed = report.suppressed;
            run.results = report.results;
            text
        }
        AgentRole::Explorer => {
            for file in results.iter().flat_map(|r| r.key_files.iter()) {
                if !run.key_files.contains(file) {
                    run.key_files.push(file.clone());
                }
            }
            workflow.store_phase_data(KEY_FILES_KEY, json!(run.key_files))?;
            run.results = results;
            format!("{} key file(s):\n{}", run.key_files.len(), run.key_files.join("\n"))
        }
        _ => {
            run.results = results;
            run.results
                .iter()
                .map(|r| match (&r.error, &r.assessment) {
                    (Some(err), _) => format!("{}: failed ({err})", r.agent_name),
                    (None, Some(a)) => format!(
                        "{}: complexity {}, effort {}, risk {}",
                        r.agent_name,
                        a.complexity.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
                        a.effort.as_deref().unwrap_or("?"),
                        a.risk.as_deref().unwrap_or("?")
                    ),
                    (None, None) => format!("{}: done", r.agent_name),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    workflow.store_phase_data(AGENT_RESULTS_KEY, to_value(&run.results)?)?;

    let failed = run.failed_count();
    if failed > 0 {
        workflow.notify(Notification::warning(format!(
            "{failed} of {} {} agent(s) failed",
            run.results.len(),
            role.as_str()
        )));
    }
    workflow.notify(Notification::panel(
        format!("Phase {} agents", phase.index + 1),
        summary,
    ));
    Ok(run)
}
