//! Multi-phase workflows
//!
//! - `WorkflowManager` - Linear phase state machine with confirmation gates
//! - `WorkflowTemplate` - Phase catalog, including the built-in `feature-dev`
//! - `run_phase_agents` - Parallel explorers, architects, and reviewers

pub mod agents;
pub mod manager;
pub mod template;

pub use agents::{default_tasks_for, earlier_key_files, run_phase_agents, PhaseAgentRun};
pub use manager::{WorkflowManager, WorkflowRun};
pub use template::{WorkflowPhase, WorkflowTemplate};
