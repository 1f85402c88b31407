//! Error taxonomy for the orchestration core.
//!
//! Every rejected state-machine call returns one of these and leaves the
//! owning manager untouched. Callers that only care about the category use
//! [`OrchestrationError::kind`].

use thiserror::Error;

use crate::hooks::HookNotice;

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidState,
    UnknownQuestion,
    PhaseNotConfirmed,
    AlreadyActive,
    ExternalService,
    HookBlocked,
    InvalidCommand,
}

/// Errors raised by the plan, workflow, hook, and dispatch layers.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Operation not allowed in the current mode or phase.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Plan operation attempted without an active plan.
    #[error("No active plan")]
    NoActivePlan,

    /// Execution context requested before every question was answered.
    #[error("Plan is not ready: {} unanswered question(s): {}", .unanswered.len(), .unanswered.join(", "))]
    PlanNotReady {
        /// Question ids still waiting for an answer, in plan order.
        unanswered: Vec<String>,
    },

    /// Answer references a question id that is not part of the plan.
    #[error("Unknown question id: {0}")]
    UnknownQuestion(String),

    /// Advance attempted from a gated phase that has not been confirmed.
    #[error("Phase {} ({name}) requires confirmation before advancing", .index + 1)]
    PhaseNotConfirmed {
        /// Zero-based phase index.
        index: usize,
        /// Phase name.
        name: String,
    },

    /// A workflow or plan is already running.
    #[error("Already active: {0}")]
    AlreadyActive(String),

    /// Workflow operation attempted without an active workflow.
    #[error("No active workflow")]
    NoActiveWorkflow,

    /// No template registered under the given slug.
    #[error("Unknown workflow template: {0}")]
    UnknownWorkflow(String),

    /// Phase index outside the workflow's phase list.
    #[error("Phase index {index} out of range (workflow has {len} phases)")]
    PhaseOutOfRange { index: usize, len: usize },

    /// Language model or tool call failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// A pre-tool hook vetoed the call.
    #[error("Tool '{tool}' blocked by hook: {}", .messages.join("; "))]
    HookBlocked {
        /// Tool that was vetoed.
        tool: String,
        /// Blocking messages, in hook registration order.
        messages: Vec<String>,
        /// Warnings raised by other hooks in the same pre-tool run.
        warnings: Vec<HookNotice>,
    },

    /// Malformed slash command or argument.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl OrchestrationError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    /// Map to the coarse category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState(_)
            | Self::NoActivePlan
            | Self::PlanNotReady { .. }
            | Self::NoActiveWorkflow
            | Self::PhaseOutOfRange { .. } => ErrorKind::InvalidState,
            Self::UnknownQuestion(_) => ErrorKind::UnknownQuestion,
            Self::PhaseNotConfirmed { .. } => ErrorKind::PhaseNotConfirmed,
            Self::AlreadyActive(_) => ErrorKind::AlreadyActive,
            Self::ExternalService(_) => ErrorKind::ExternalService,
            Self::HookBlocked { .. } => ErrorKind::HookBlocked,
            Self::InvalidCommand(_) | Self::UnknownWorkflow(_) => ErrorKind::InvalidCommand,
        }
    }
}

impl From<anyhow::Error> for OrchestrationError {
    fn from(err: anyhow::Error) -> Self {
        Self::ExternalService(format!("{err:#}"))
    }
}
