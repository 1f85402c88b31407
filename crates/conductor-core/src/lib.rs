//! Conductor core
//!
//! Orchestration for a coding agent: plan mode with interactive questions,
//! gated multi-phase workflows, tool hooks, and parallel review agents.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod hooks;
pub mod orchestrator;
pub mod paths;
pub mod plan;
pub mod workflow;

pub use config::ConductorConfig;
pub use error::{ErrorKind, OrchestrationError, Result};
pub use events::{Notification, NotificationKind};
pub use orchestrator::Session;
