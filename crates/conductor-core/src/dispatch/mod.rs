//! Parallel agents
//!
//! - `ParallelAgentDispatcher` - Concurrent fan-out with per-task isolation
//! - `filter_by_confidence` / `dedupe_findings` - Review noise reduction
//! - `ModelAgentInvoker` - One model call per task
//! - `extract` - Findings, key files, and assessments from agent markdown

pub mod confidence;
pub mod dispatcher;
pub mod extract;
pub mod invoker;
pub mod types;

pub use confidence::{
    aggregate_review, dedupe_findings, filter_by_confidence, format_review_report, ReviewReport,
    DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use dispatcher::{DispatchConfig, ParallelAgentDispatcher, DEFAULT_AGENT_TIMEOUT};
pub use invoker::ModelAgentInvoker;
pub use types::{
    AgentInvoker, AgentOutput, AgentResult, AgentRole, AgentTask, ArchitectAssessment, Finding,
    Severity,
};
