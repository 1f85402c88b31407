//! Conversation driver
//!
//! ## Session
//! - `Session` - Owns both managers and routes operator input
//! - `CommandRouter` / `SlashCommand` - Slash commands onto manager calls
//!
//! ## Capabilities
//! - `LanguageModel` - External model, one call per prompt
//! - `ToolExecutor` - External tool runner
//! - `GatedToolRunner` - Tool execution wrapped in the hook pipeline

pub mod commands;
pub mod llm;
pub mod session;
pub mod tools;

pub use commands::{help_text, CommandOutcome, CommandRouter, Followup, SlashCommand, COMMANDS};
pub use llm::{ChatMessage, LanguageModel, ModelResponse, PromptContext, Role, ToolCall};
pub use session::{Session, TurnOutcome, DEFAULT_MAX_TOOL_ROUNDS};
pub use tools::{GatedToolRunner, ToolExecutor, ToolRun, DEFAULT_TOOL_TIMEOUT};
