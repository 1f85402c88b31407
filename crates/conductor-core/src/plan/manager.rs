//! Plan mode manager
//!
//! Owns the operating mode flag and at most one active interactive plan:
//! - Switching to execution mode discards the plan
//! - Answers are upserted, last write wins
//! - Rejected calls never mutate state

use chrono::{DateTime, Utc};

use super::types::{InteractivePlan, OperatingMode};
use crate::error::{OrchestrationError, Result};

/// Observable state of the plan-mode state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanModeState {
    Execution,
    /// Plan mode, no plan yet
    PlanIdle,
    /// Plan active with unanswered questions
    PlanPending,
    /// Every question answered
    PlanReady,
}

/// A recorded mode switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub at: DateTime<Utc>,
    pub from: OperatingMode,
    pub to: OperatingMode,
}

/// Manages the operating mode and the active interactive plan
#[derive(Debug, Default)]
pub struct PlanModeManager {
    mode: OperatingMode,
    active_plan: Option<InteractivePlan>,
    history: Vec<ModeChange>,
}

impl PlanModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in the given mode without recording a history entry
    pub fn with_mode(mode: OperatingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn is_plan_mode(&self) -> bool {
        self.mode == OperatingMode::Plan
    }

    /// Switch modes. Leaving plan mode drops the active plan unconditionally.
    pub fn set_mode(&mut self, mode: OperatingMode) {
        if mode != self.mode {
            self.history.push(ModeChange {
                at: Utc::now(),
                from: self.mode,
                to: mode,
            });
            tracing::info!(from = %self.mode, to = %mode, "Operating mode changed");
            self.mode = mode;
        }
        if mode == OperatingMode::Execution && self.active_plan.take().is_some() {
            tracing::debug!("Active plan discarded on switch to execution mode");
        }
    }

    /// Mode switches in the order they happened
    pub fn mode_history(&self) -> &[ModeChange] {
        &self.history
    }

    pub fn state(&self) -> PlanModeState {
        match (self.mode, &self.active_plan) {
            (OperatingMode::Execution, _) => PlanModeState::Execution,
            (OperatingMode::Plan, None) => PlanModeState::PlanIdle,
            (OperatingMode::Plan, Some(plan)) if plan.is_complete() => PlanModeState::PlanReady,
            (OperatingMode::Plan, Some(_)) => PlanModeState::PlanPending,
        }
    }

    /// Install a new plan. Requires plan mode and no active plan.
    pub fn begin_plan(&mut self, plan: InteractivePlan) -> Result<()> {
        if self.mode != OperatingMode::Plan {
            return Err(OrchestrationError::invalid_state(
                "plans can only be started in plan mode",
            ));
        }
        if self.active_plan.is_some() {
            return Err(OrchestrationError::invalid_state(
                "a plan is already active; clear it first",
            ));
        }

        tracing::info!(
            steps = plan.steps().len(),
            questions = plan.questions().len(),
            "Interactive plan started"
        );
        self.active_plan = Some(plan);
        Ok(())
    }

    pub fn active_plan(&self) -> Option<&InteractivePlan> {
        self.active_plan.as_ref()
    }

    pub fn has_active_plan(&self) -> bool {
        self.active_plan.is_some()
    }

    /// Record an answer and report whether the plan is now fully answered
    pub fn answer_question(
        &mut self,
        question_id: &str,
        value: impl Into<String>,
        is_custom: bool,
    ) -> Result<bool> {
        let plan = self
            .active_plan
            .as_mut()
            .ok_or(OrchestrationError::NoActivePlan)?;
        plan.record_answer(question_id, value, is_custom)?;

        let complete = plan.is_complete();
        tracing::debug!(question_id, is_custom, complete, "Plan question answered");
        Ok(complete)
    }

    /// True iff a plan is active and every question is answered
    pub fn can_execute(&self) -> bool {
        self.active_plan
            .as_ref()
            .is_some_and(InteractivePlan::is_complete)
    }

    /// Ids of questions still waiting for an answer
    pub fn unanswered_questions(&self) -> Result<Vec<String>> {
        let plan = self
            .active_plan
            .as_ref()
            .ok_or(OrchestrationError::NoActivePlan)?;
        Ok(plan.unanswered().into_iter().map(|q| q.id.clone()).collect())
    }

    /// Render the ready plan for the executor.
    ///
    /// Advisory: the caller decides whether to call this before execution.
    pub fn build_execution_context(&self) -> Result<String> {
        let plan = self
            .active_plan
            .as_ref()
            .ok_or(OrchestrationError::NoActivePlan)?;
        if !plan.is_complete() {
            return Err(OrchestrationError::PlanNotReady {
                unanswered: plan.unanswered().into_iter().map(|q| q.id.clone()).collect(),
            });
        }
        Ok(plan.to_context_string())
    }

    /// Build the execution context and destroy the plan.
    ///
    /// On failure the plan is left in place.
    pub fn take_for_execution(&mut self) -> Result<String> {
        let context = self.build_execution_context()?;
        self.active_plan = None;
        tracing::info!("Interactive plan handed off for execution");
        Ok(context)
    }

    /// Drop the active plan; no-op when there is none
    pub fn clear_plan(&mut self) {
        if self.active_plan.take().is_some() {
            tracing::debug!("Interactive plan cleared");
        }
    }
}
