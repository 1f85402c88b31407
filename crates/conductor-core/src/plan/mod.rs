//! Plan mode
//!
//! - `PlanModeManager` - Operating mode flag and the active interactive plan
//! - `InteractivePlan` - Steps plus questions awaiting answers
//! - `parse_planner_response` - Turn planner output into a plan
//! - `render` - Plain-text summaries for the shell

pub mod manager;
pub mod parse;
pub mod render;
pub mod types;

pub use manager::{ModeChange, PlanModeManager, PlanModeState};
pub use parse::{parse_planner_response, PLANNER_SYSTEM_PROMPT};
pub use types::{
    ExecutionMode, InteractivePlan, OperatingMode, PlanAnswer, PlanQuestion, PlanStep,
};
