//! Workflow manager
//!
//! Drives one linear multi-phase run at a time. Phases advance strictly one
//! step at a time, and gated phases need an explicit confirmation before the
//! run may move past them. Rejected calls leave the run untouched.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::template::{WorkflowPhase, WorkflowTemplate};
use crate::error::{OrchestrationError, Result};
use crate::events::Notification;

const DEFAULT_GOAL: &str = "Work with the user to define the feature goal before continuing.";

/// State of one workflow invocation.
///
/// A finished run stays readable (status, phase data) until it is cleared or
/// replaced, but rejects further mutation.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    template: WorkflowTemplate,
    goal: String,
    started_at: DateTime<Utc>,
    current_index: usize,
    confirmed: BTreeSet<usize>,
    phase_data: HashMap<usize, HashMap<String, Value>>,
    finished: bool,
}

impl WorkflowRun {
    pub fn template(&self) -> &WorkflowTemplate {
        &self.template
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// True once `advance_phase` was called on the last phase
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_phase(&self) -> &WorkflowPhase {
        // current_index is kept in range by every mutation
        &self.template.phases()[self.current_index]
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.template.len() {
            return Err(OrchestrationError::PhaseOutOfRange {
                index,
                len: self.template.len(),
            });
        }
        Ok(())
    }

    fn is_confirmed(&self, index: usize) -> bool {
        match self.template.phase(index) {
            Some(phase) if phase.requires_confirmation => self.confirmed.contains(&index),
            Some(_) => true,
            None => false,
        }
    }
}

/// Owns the active workflow run and its operator notifications
#[derive(Debug, Default)]
pub struct WorkflowManager {
    run: Option<WorkflowRun>,
    notifications: VecDeque<Notification>,
}

impl WorkflowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run at phase 0.
    ///
    /// Rejected while an unfinished run exists; a finished run is replaced.
    pub fn start(&mut self, template: WorkflowTemplate, goal: impl Into<String>) -> Result<()> {
        if let Some(run) = self.run.as_ref().filter(|r| !r.finished) {
            return Err(OrchestrationError::AlreadyActive(format!(
                "workflow '{}' is in phase {} of {}",
                run.template.title,
                run.current_index + 1,
                run.template.len()
            )));
        }
        if template.is_empty() {
            return Err(OrchestrationError::invalid_state(format!(
                "workflow '{}' has no phases",
                template.slug
            )));
        }

        let goal = goal.into();
        let goal = if goal.trim().is_empty() {
            DEFAULT_GOAL.to_string()
        } else {
            goal.trim().to_string()
        };

        tracing::info!(
            workflow = %template.slug,
            phases = template.len(),
            "Workflow started"
        );
        let run = WorkflowRun {
            template,
            goal,
            started_at: Utc::now(),
            current_index: 0,
            confirmed: BTreeSet::new(),
            phase_data: HashMap::new(),
            finished: false,
        };
        self.notify(Notification::panel(run.template.title.clone(), render_overview(&run)));
        self.run = Some(run);
        Ok(())
    }

    /// Start a built-in template by slug
    pub fn start_builtin(&mut self, slug: &str, goal: impl Into<String>) -> Result<()> {
        let template = WorkflowTemplate::builtin(slug)
            .ok_or_else(|| OrchestrationError::UnknownWorkflow(slug.to_string()))?;
        self.start(template, goal)
    }

    pub fn run(&self) -> Option<&WorkflowRun> {
        self.run.as_ref()
    }

    /// A run exists and has not finished
    pub fn is_active(&self) -> bool {
        self.run.as_ref().is_some_and(|r| !r.finished)
    }

    fn run_ref(&self) -> Result<&WorkflowRun> {
        self.run.as_ref().ok_or(OrchestrationError::NoActiveWorkflow)
    }

    fn run_mut(&mut self) -> Result<&mut WorkflowRun> {
        self.run.as_mut().ok_or(OrchestrationError::NoActiveWorkflow)
    }

    /// Like `run_mut`, but a finished run is read-only
    fn live_run_mut(&mut self) -> Result<&mut WorkflowRun> {
        let run = self.run_mut()?;
        if run.finished {
            return Err(OrchestrationError::invalid_state(format!(
                "workflow '{}' has finished",
                run.template.title
            )));
        }
        Ok(run)
    }

    pub fn current_phase(&self) -> Result<&WorkflowPhase> {
        Ok(self.run_ref()?.current_phase())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.run.as_ref().map(|r| r.current_index)
    }

    /// Mark a phase confirmed; defaults to the current phase. Idempotent.
    pub fn confirm_phase(&mut self, index: Option<usize>) -> Result<()> {
        let run = self.live_run_mut()?;
        let index = index.unwrap_or(run.current_index);
        run.check_index(index)?;

        let newly = run.confirmed.insert(index);
        let phase = &run.template.phases()[index];
        let note = (newly && phase.requires_confirmation)
            .then(|| format!("Phase {} ({}) confirmed by user.", index + 1, phase.name));

        tracing::debug!(phase = index, newly, "Workflow phase confirmed");
        if let Some(note) = note {
            self.notify(Notification::info(note));
        }
        Ok(())
    }

    /// Phases without a gate always count as confirmed
    pub fn is_phase_confirmed(&self, index: Option<usize>) -> bool {
        self.run
            .as_ref()
            .is_some_and(|r| r.is_confirmed(index.unwrap_or(r.current_index)))
    }

    /// Move to the next phase.
    ///
    /// Returns `Ok(false)` once the last phase is left behind, on that call
    /// and every later one.
    pub fn advance_phase(&mut self) -> Result<bool> {
        let run = self.run_mut()?;
        if run.finished {
            return Ok(false);
        }

        let index = run.current_index;
        if !run.is_confirmed(index) {
            let name = run.current_phase().name.clone();
            tracing::debug!(phase = index, "Advance rejected, phase unconfirmed");
            return Err(OrchestrationError::PhaseNotConfirmed { index, name });
        }

        if index + 1 >= run.template.len() {
            run.finished = true;
            let title = run.template.title.clone();
            tracing::info!(workflow = %run.template.slug, "Workflow completed");
            self.notify(Notification::info(format!("Workflow '{title}' completed!")));
            return Ok(false);
        }

        run.current_index += 1;
        let phase = run.current_phase();
        let body = format!("Phase {}: {}\n\n{}", phase.index + 1, phase.name, phase.focus);
        tracing::info!(phase = phase.index, name = %phase.name, "Workflow phase started");
        self.notify(Notification::panel("New Phase", body));
        Ok(true)
    }

    /// Store a value under `key` for the current phase
    pub fn store_phase_data(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let run = self.live_run_mut()?;
        let index = run.current_index;
        run.phase_data
            .entry(index)
            .or_default()
            .insert(key.into(), value);
        Ok(())
    }

    /// Read a value stored by the current phase
    pub fn phase_data(&self, key: &str) -> Option<&Value> {
        let run = self.run.as_ref()?;
        self.phase_data_at(run.current_index, key)
    }

    /// Read a value stored by any phase
    pub fn phase_data_at(&self, index: usize, key: &str) -> Option<&Value> {
        self.run.as_ref()?.phase_data.get(&index)?.get(key)
    }

    /// Every value stored by one phase, sorted by key
    pub fn phase_data_entries(&self, index: usize) -> Vec<(&str, &Value)> {
        let Some(data) = self.run.as_ref().and_then(|r| r.phase_data.get(&index)) else {
            return Vec::new();
        };
        let mut entries: Vec<_> = data.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// `PHASE <n> – <NAME>` for the given or current phase
    pub fn header_for(&self, index: Option<usize>) -> Result<String> {
        let run = self.run_ref()?;
        let index = index.unwrap_or(run.current_index);
        run.check_index(index)?;
        let phase = &run.template.phases()[index];
        Ok(format!("PHASE {} – {}", index + 1, phase.name.to_uppercase()))
    }

    /// Drop the run; no-op when there is none
    pub fn clear(&mut self) {
        if let Some(run) = self.run.take() {
            tracing::info!(workflow = %run.template.slug, "Workflow cleared");
            self.notify(Notification::info(format!(
                "Cleared workflow '{}'.",
                run.template.title
            )));
        }
    }

    /// Goal and phase list with progress markers
    pub fn status_text(&self) -> Option<String> {
        let run = self.run.as_ref()?;
        let mut lines = vec![render_overview(run), String::new()];
        if run.finished {
            lines.push("Status: completed".to_string());
        } else {
            let phase = run.current_phase();
            lines.push(format!(
                "Current: {}{}",
                format_header(phase),
                if run.is_confirmed(phase.index) {
                    ""
                } else {
                    " (awaiting confirmation)"
                }
            ));
        }
        Some(lines.join("\n"))
    }

    /// Workflow contract handed to the model while a run is active
    pub fn system_prompt(&self) -> Option<String> {
        let run = self.run.as_ref().filter(|r| !r.finished)?;
        let template = &run.template;

        let mut lines = vec![
            format!("You are running the '{}' workflow.", template.title),
            format!("Feature goal: {}", run.goal),
            String::new(),
        ];
        if !template.rules.is_empty() {
            lines.push("Workflow rules:".to_string());
            lines.extend(template.rules.iter().map(|r| format!("- {r}")));
            lines.push(String::new());
        }
        lines.push("Phases:".to_string());
        for phase in template.phases() {
            let gate = if phase.requires_confirmation {
                " (wait for user confirmation before moving on)"
            } else {
                ""
            };
            lines.push(format!("{}. {}{}", phase.index + 1, phase.name, gate));
            lines.push(format!("   Focus: {}", phase.focus));
            if !phase.instructions.is_empty() {
                lines.push(format!("   Instructions: {}", phase.instructions));
            }
        }
        lines.push(String::new());
        lines.push(format!("Current phase: {}", format_header(run.current_phase())));
        Some(lines.join("\n"))
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    /// Drain queued notifications, oldest first
    pub fn pop_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }
}

fn format_header(phase: &WorkflowPhase) -> String {
    format!("PHASE {} – {}", phase.index + 1, phase.name.to_uppercase())
}

fn render_overview(run: &WorkflowRun) -> String {
    let mut lines = vec![format!("Goal: {}", run.goal), String::new(), "Phases:".to_string()];
    for phase in run.template.phases() {
        let marker = if run.finished || phase.index < run.current_index {
            "[x]"
        } else if phase.index == run.current_index {
            "[>]"
        } else {
            "[ ]"
        };
        let flag = if phase.requires_confirmation {
            " (wait for user)"
        } else {
            ""
        };
        lines.push(format!("{marker} {}. {}{flag}", phase.index + 1, phase.name));
    }
    lines.join("\n")
}
