//! Slash commands
//!
//! Operator commands map one-to-one onto plan and workflow manager calls.
//! Parsing is strict: unknown commands and malformed arguments are errors,
//! never forwarded to the model as text.

use super::llm::ChatMessage;
use crate::error::{OrchestrationError, Result};
use crate::events::Notification;
use crate::plan::render::{format_plan_summary, format_question_status, format_questions};
use crate::plan::{OperatingMode, PlanModeManager};
use crate::workflow::WorkflowManager;

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    PlanMode,
    ExecutionMode,
    Answer { question_id: String, value: String },
    ShowPlan,
    ExecutePlan,
    ClearPlan,
    FeatureDev { goal: String },
    WorkflowStatus,
    /// Zero-based phase index; `None` for the current phase
    WorkflowConfirm { phase: Option<usize> },
    WorkflowAdvance,
    WorkflowAgents,
    WorkflowClear,
    /// Independent reviewers over `context` (empty for the working tree)
    CodeReview { context: String },
    Mode,
    Help,
}

/// Command table entry
pub struct CommandInfo {
    pub primary: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub description: &'static str,
}

/// Every command, in help order
pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        primary: "plan-mode",
        aliases: &["plan"],
        usage: "/plan-mode",
        description: "Plan first and ask questions before executing",
    },
    CommandInfo {
        primary: "execution-mode",
        aliases: &["exec-mode"],
        usage: "/execution-mode",
        description: "Execute requests directly (discards the active plan)",
    },
    CommandInfo {
        primary: "answer",
        aliases: &[],
        usage: "/answer <id>:<value>",
        description: "Answer a plan question",
    },
    CommandInfo {
        primary: "show-plan",
        aliases: &[],
        usage: "/show-plan",
        description: "Show the active plan and its questions",
    },
    CommandInfo {
        primary: "execute-plan",
        aliases: &[],
        usage: "/execute-plan",
        description: "Run the plan once every question is answered",
    },
    CommandInfo {
        primary: "clear-plan",
        aliases: &[],
        usage: "/clear-plan",
        description: "Discard the active plan",
    },
    CommandInfo {
        primary: "feature-dev",
        aliases: &[],
        usage: "/feature-dev <goal>",
        description: "Start the seven-phase feature workflow",
    },
    CommandInfo {
        primary: "workflow-status",
        aliases: &[],
        usage: "/workflow-status",
        description: "Show workflow progress",
    },
    CommandInfo {
        primary: "workflow-confirm",
        aliases: &["confirm"],
        usage: "/workflow-confirm [n]",
        description: "Confirm phase n (default: current phase)",
    },
    CommandInfo {
        primary: "workflow-advance",
        aliases: &["advance"],
        usage: "/workflow-advance",
        description: "Move to the next phase",
    },
    CommandInfo {
        primary: "workflow-agents",
        aliases: &["agents"],
        usage: "/workflow-agents",
        description: "Run the current phase's parallel agents",
    },
    CommandInfo {
        primary: "workflow-clear",
        aliases: &[],
        usage: "/workflow-clear",
        description: "Abandon the active workflow",
    },
    CommandInfo {
        primary: "code-review",
        aliases: &["review"],
        usage: "/code-review [context]",
        description: "Run parallel reviewers and report high-confidence issues",
    },
    CommandInfo {
        primary: "mode",
        aliases: &[],
        usage: "/mode",
        description: "Show the operating mode",
    },
    CommandInfo {
        primary: "help",
        aliases: &["?"],
        usage: "/help",
        description: "List commands",
    },
];

fn lookup(name: &str) -> Option<&'static CommandInfo> {
    let name = name.to_ascii_lowercase().replace('_', "-");
    COMMANDS
        .iter()
        .find(|c| c.primary == name || c.aliases.contains(&name.as_str()))
}

impl SlashCommand {
    /// `None` when `input` is not a slash command
    pub fn parse(input: &str) -> Option<Result<Self>> {
        let body = input.trim().strip_prefix('/')?;
        Some(Self::parse_body(body))
    }

    fn parse_body(body: &str) -> Result<Self> {
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        let info = lookup(name).ok_or_else(|| {
            OrchestrationError::invalid_command(format!("unknown command '/{name}', try /help"))
        })?;

        let cmd = match info.primary {
            "plan-mode" => Self::PlanMode,
            "execution-mode" => Self::ExecutionMode,
            "answer" => {
                let (id, value) = rest.split_once(':').ok_or_else(|| {
                    OrchestrationError::invalid_command("use /answer <question_id>:<your answer>")
                })?;
                let (id, value) = (id.trim(), value.trim());
                if id.is_empty() || value.is_empty() {
                    return Err(OrchestrationError::invalid_command(
                        "both question id and answer are required",
                    ));
                }
                Self::Answer {
                    question_id: id.to_string(),
                    value: value.to_string(),
                }
            }
            "show-plan" => Self::ShowPlan,
            "execute-plan" => Self::ExecutePlan,
            "clear-plan" => Self::ClearPlan,
            "feature-dev" => Self::FeatureDev {
                goal: rest.to_string(),
            },
            "workflow-status" => Self::WorkflowStatus,
            "workflow-confirm" => {
                let phase = if rest.is_empty() {
                    None
                } else {
                    let n: usize = rest.parse().map_err(|_| {
                        OrchestrationError::invalid_command(format!(
                            "phase must be a number, got '{rest}'"
                        ))
                    })?;
                    if n == 0 {
                        return Err(OrchestrationError::invalid_command("phases are numbered from 1"));
                    }
                    Some(n - 1)
                };
                Self::WorkflowConfirm { phase }
            }
            "workflow-advance" => Self::WorkflowAdvance,
            "workflow-agents" => Self::WorkflowAgents,
            "workflow-clear" => Self::WorkflowClear,
            "code-review" => Self::CodeReview {
                context: rest.to_string(),
            },
            "mode" => Self::Mode,
            "help" => Self::Help,
            other => {
                return Err(OrchestrationError::invalid_command(format!(
                    "command '/{other}' has no handler"
                )))
            }
        };
        Ok(cmd)
    }
}

/// Work the session still has to do after a command
#[derive(Debug, Clone, PartialEq)]
pub enum Followup {
    /// Send this message to the model
    Prompt(ChatMessage),
    /// Dispatch the current phase's agents
    RunPhaseAgents,
    /// Dispatch the default reviewers over this context
    RunReview(String),
}

#[derive(Debug, Default)]
pub struct CommandOutcome {
    pub notifications: Vec<Notification>,
    pub followup: Option<Followup>,
}

impl CommandOutcome {
    fn note(mut self, n: Notification) -> Self {
        self.notifications.push(n);
        self
    }

    fn then(mut self, followup: Followup) -> Self {
        self.followup = Some(followup);
        self
    }
}

/// Applies commands to the session's managers
pub struct CommandRouter<'a> {
    plan: &'a mut PlanModeManager,
    workflow: &'a mut WorkflowManager,
}

impl<'a> CommandRouter<'a> {
    pub fn new(plan: &'a mut PlanModeManager, workflow: &'a mut WorkflowManager) -> Self {
        Self { plan, workflow }
    }

    /// Apply one command. Errors leave both managers unchanged.
    pub fn handle(&mut self, cmd: SlashCommand) -> Result<CommandOutcome> {
        tracing::debug!(command = ?cmd, "Slash command");
        let outcome = match cmd {
            SlashCommand::PlanMode => {
                self.plan.set_mode(OperatingMode::Plan);
                CommandOutcome::default().note(Notification::info(
                    "Switched to PLAN MODE. Requests produce a plan with questions before anything runs.",
                ))
            }
            SlashCommand::ExecutionMode => {
                self.plan.set_mode(OperatingMode::Execution);
                CommandOutcome::default().note(Notification::info(
                    "Switched to EXECUTION MODE. Requests run immediately.",
                ))
            }
            SlashCommand::Answer { question_id, value } => self.answer(&question_id, value)?,
            SlashCommand::ShowPlan => self.show_plan(),
            SlashCommand::ExecutePlan => {
                let context = self.plan.take_for_execution()?;
                let prompt = format!(
                    "Execute the following plan with the user's preferences:\n\n{context}\n\n\
                     Follow the plan steps and use the user's answers to customize the implementation."
                );
                CommandOutcome::default()
                    .note(Notification::info("Executing plan."))
                    .then(Followup::Prompt(
                        ChatMessage::user(prompt).named("command:execute-plan"),
                    ))
            }
            SlashCommand::ClearPlan => {
                let had = self.plan.has_active_plan();
                self.plan.clear_plan();
                let msg = if had { "Plan cleared." } else { "No active plan." };
                CommandOutcome::default().note(Notification::info(msg))
            }
            SlashCommand::FeatureDev { goal } => {
                self.workflow.start_builtin("feature-dev", goal)?;
                let goal = self
                    .workflow
                    .run()
                    .map(|r| r.goal().to_string())
                    .unwrap_or_default();
                let kickoff = format!(
                    "Feature goal: {goal}\n\
                     Start Phase 1 (Discovery) now. Surface what you know, list uncertainties, and ask \
                     targeted questions before moving on. Announce the phase name at the top of each reply."
                );
                CommandOutcome::default().then(Followup::Prompt(
                    ChatMessage::user(kickoff).named("command:feature-dev"),
                ))
            }
            SlashCommand::WorkflowStatus => {
                let note = match self.workflow.status_text() {
                    Some(text) => Notification::panel("Workflow", text),
                    None => Notification::info("No active workflow."),
                };
                CommandOutcome::default().note(note)
            }
            SlashCommand::WorkflowConfirm { phase } => {
                self.workflow.confirm_phase(phase)?;
                CommandOutcome::default()
            }
            SlashCommand::WorkflowAdvance => {
                if self.workflow.advance_phase()? {
                    let phase = self.workflow.current_phase()?;
                    let header = self.workflow.header_for(None)?;
                    let prompt = format!("{header} has started. Focus: {}", phase.focus);
                    CommandOutcome::default().then(Followup::Prompt(
                        ChatMessage::user(prompt).named("command:workflow-advance"),
                    ))
                } else {
                    CommandOutcome::default()
                }
            }
            SlashCommand::WorkflowAgents => {
                let phase = self.workflow.current_phase()?;
                if !self.workflow.is_active() || phase.agent_role.is_none() {
                    return Err(OrchestrationError::invalid_state(format!(
                        "phase {} ({}) does not run agents",
                        phase.index + 1,
                        phase.name
                    )));
                }
                CommandOutcome::default().then(Followup::RunPhaseAgents)
            }
            SlashCommand::WorkflowClear => {
                self.workflow.clear();
                CommandOutcome::default()
            }
            SlashCommand::CodeReview { context } => CommandOutcome::default()
                .note(Notification::info("Launching parallel code reviewers."))
                .then(Followup::RunReview(context)),
            SlashCommand::Mode => CommandOutcome::default().note(Notification::info(format!(
                "Mode: {} ({:?})",
                self.plan.mode(),
                self.plan.state()
            ))),
            SlashCommand::Help => {
                CommandOutcome::default().note(Notification::panel("Commands", help_text()))
            }
        };

        // Workflow notices first, they describe what the command just did
        let mut notifications = self.workflow.pop_notifications();
        notifications.extend(outcome.notifications);
        Ok(CommandOutcome {
            notifications,
            followup: outcome.followup,
        })
    }

    fn answer(&mut self, question_id: &str, value: String) -> Result<CommandOutcome> {
        let plan = self
            .plan
            .active_plan()
            .ok_or(OrchestrationError::NoActivePlan)?;
        let question = plan
            .question(question_id)
            .ok_or_else(|| OrchestrationError::UnknownQuestion(question_id.to_string()))?;

        let is_custom = !question.is_choice(&value);
        if is_custom && !question.allow_custom_answer {
            return Err(OrchestrationError::invalid_command(format!(
                "question {} only accepts: {}",
                question_id,
                question.choices.join(", ")
            )));
        }

        let complete = self.plan.answer_question(question_id, value, is_custom)?;
        let msg = if complete {
            format!("Answer recorded for {question_id}. All questions answered! Use /execute-plan to run.")
        } else {
            let remaining = self.plan.unanswered_questions()?.len();
            format!("Answer recorded for {question_id}. {remaining} question(s) remaining.")
        };
        Ok(CommandOutcome::default().note(Notification::info(msg)))
    }

    fn show_plan(&self) -> CommandOutcome {
        let Some(plan) = self.plan.active_plan() else {
            return CommandOutcome::default().note(Notification::info(
                "No active plan. Create one by sending a request in plan mode.",
            ));
        };
        let mut outcome = CommandOutcome::default()
            .note(Notification::panel("Current Plan", format_plan_summary(plan)));
        let unanswered: Vec<_> = plan.unanswered().into_iter().cloned().collect();
        if !unanswered.is_empty() {
            outcome = outcome.note(Notification::panel("Questions", format_questions(&unanswered)));
        }
        outcome.note(Notification::panel("Question Status", format_question_status(plan)))
    }
}

/// One line per command
pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    COMMANDS
        .iter()
        .map(|c| format!("{:width$}  {}", c.usage, c.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ExecutionMode, InteractivePlan, PlanQuestion, PlanStep};

    fn parse(s: &str) -> Result<SlashCommand> {
        SlashCommand::parse(s).expect("slash command")
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(SlashCommand::parse("fix the bug").is_none());
    }

    #[test]
    fn names_and_aliases() {
        assert_eq!(parse("/plan-mode").unwrap(), SlashCommand::PlanMode);
        assert_eq!(parse("/plan_mode").unwrap(), SlashCommand::PlanMode);
        assert_eq!(parse("/exec-mode").unwrap(), SlashCommand::ExecutionMode);
        assert_eq!(parse("  /HELP ").unwrap(), SlashCommand::Help);
        assert_eq!(
            parse("/feature-dev add OAuth login").unwrap(),
            SlashCommand::FeatureDev {
                goal: "add OAuth login".into()
            }
        );
    }

    #[test]
    fn unknown_command_rejected() {
        let err = parse("/frobnicate").unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidCommand(_)));
    }

    #[test]
    fn answer_parsing() {
        assert_eq!(
            parse("/answer q1: Option A ").unwrap(),
            SlashCommand::Answer {
                question_id: "q1".into(),
                value: "Option A".into()
            }
        );
        // Only the first colon splits
        assert_eq!(
            parse("/answer q2:use http://x").unwrap(),
            SlashCommand::Answer {
                question_id: "q2".into(),
                value: "use http://x".into()
            }
        );
        assert!(parse("/answer q1").is_err());
        assert!(parse("/answer :A").is_err());
        assert!(parse("/answer q1:").is_err());
    }

    #[test]
    fn confirm_parsing() {
        assert_eq!(
            parse("/workflow-confirm").unwrap(),
            SlashCommand::WorkflowConfirm { phase: None }
        );
        assert_eq!(
            parse("/workflow-confirm 3").unwrap(),
            SlashCommand::WorkflowConfirm { phase: Some(2) }
        );
        assert!(parse("/workflow-confirm 0").is_err());
        assert!(parse("/workflow-confirm two").is_err());
    }

    fn plan_manager() -> PlanModeManager {
        let mut pm = PlanModeManager::new();
        pm.set_mode(OperatingMode::Plan);
        pm.begin_plan(
            InteractivePlan::new(
                ExecutionMode::Single,
                vec![PlanStep::new("step1", "Build it")],
                vec![
                    PlanQuestion::new("q1", "Which db?").with_choices(["sqlite", "postgres"]),
                    PlanQuestion::new("q2", "Which port?")
                        .with_choices(["80", "8080"])
                        .allow_custom(false),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        pm
    }

    #[test]
    fn answer_marks_custom_values() {
        let mut pm = plan_manager();
        let mut wf = WorkflowManager::new();
        let mut router = CommandRouter::new(&mut pm, &mut wf);

        let out = router.handle(parse("/answer q1:mysql").unwrap()).unwrap();
        assert!(out.notifications[0].body.contains("1 question(s) remaining"));
        router.handle(parse("/answer q2:8080").unwrap()).unwrap();

        let plan = pm.active_plan().unwrap();
        assert!(plan.answer("q1").unwrap().is_custom);
        assert!(!plan.answer("q2").unwrap().is_custom);
    }

    #[test]
    fn custom_answer_rejected_when_not_allowed() {
        let mut pm = plan_manager();
        let mut wf = WorkflowManager::new();
        let err = CommandRouter::new(&mut pm, &mut wf)
            .handle(parse("/answer q2:9999").unwrap())
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidCommand(_)));
        assert!(pm.active_plan().unwrap().answer("q2").is_none());
    }

    #[test]
    fn answer_errors() {
        let mut pm = PlanModeManager::new();
        let mut wf = WorkflowManager::new();
        let err = CommandRouter::new(&mut pm, &mut wf)
            .handle(parse("/answer q1:x").unwrap())
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::NoActivePlan));

        let mut pm = plan_manager();
        let err = CommandRouter::new(&mut pm, &mut wf)
            .handle(parse("/answer q7:x").unwrap())
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::UnknownQuestion(_)));
    }

    #[test]
    fn execute_plan_requires_answers_then_hands_off() {
        let mut pm = plan_manager();
        let mut wf = WorkflowManager::new();
        let mut router = CommandRouter::new(&mut pm, &mut wf);

        let err = router.handle(SlashCommand::ExecutePlan).unwrap_err();
        assert!(matches!(err, OrchestrationError::PlanNotReady { .. }));

        router.handle(parse("/answer q1:sqlite").unwrap()).unwrap();
        router.handle(parse("/answer q2:80").unwrap()).unwrap();
        let out = router.handle(SlashCommand::ExecutePlan).unwrap();
        match out.followup {
            Some(Followup::Prompt(msg)) => {
                assert!(msg.content.contains("=== INTERACTIVE PLAN ==="));
                assert_eq!(msg.name.as_deref(), Some("command:execute-plan"));
            }
            other => panic!("expected prompt, got {other:?}"),
        }
        assert!(!pm.has_active_plan());
    }

    #[test]
    fn execution_mode_discards_plan() {
        let mut pm = plan_manager();
        let mut wf = WorkflowManager::new();
        CommandRouter::new(&mut pm, &mut wf)
            .handle(SlashCommand::ExecutionMode)
            .unwrap();
        assert!(!pm.has_active_plan());
        assert_eq!(pm.mode(), OperatingMode::Execution);
    }

    #[test]
    fn show_plan_lists_open_questions() {
        let mut pm = plan_manager();
        let mut wf = WorkflowManager::new();
        let out = CommandRouter::new(&mut pm, &mut wf)
            .handle(SlashCommand::ShowPlan)
            .unwrap();
        let titles: Vec<_> = out
            .notifications
            .iter()
            .filter_map(|n| n.title.as_deref())
            .collect();
        assert_eq!(titles, vec!["Current Plan", "Questions", "Question Status"]);
    }

    #[test]
    fn feature_dev_flow() {
        let mut pm = PlanModeManager::new();
        let mut wf = WorkflowManager::new();
        let mut router = CommandRouter::new(&mut pm, &mut wf);

        let out = router.handle(parse("/feature-dev add login").unwrap()).unwrap();
        assert_eq!(out.notifications[0].title.as_deref(), Some("Feature Development Workflow"));
        assert!(matches!(out.followup, Some(Followup::Prompt(_))));

        let err = router.handle(SlashCommand::WorkflowAdvance).unwrap_err();
        assert!(matches!(err, OrchestrationError::PhaseNotConfirmed { .. }));

        let err = router.handle(SlashCommand::WorkflowAgents).unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidState(_)));

        router.handle(parse("/workflow-confirm").unwrap()).unwrap();
        let out = router.handle(SlashCommand::WorkflowAdvance).unwrap();
        match out.followup {
            Some(Followup::Prompt(msg)) => {
                assert!(msg.content.starts_with("PHASE 2 – CODEBASE EXPLORATION"))
            }
            other => panic!("expected prompt, got {other:?}"),
        }

        let out = router.handle(SlashCommand::WorkflowAgents).unwrap();
        assert_eq!(out.followup, Some(Followup::RunPhaseAgents));

        let err = router.handle(parse("/feature-dev again").unwrap()).unwrap_err();
        assert!(matches!(err, OrchestrationError::AlreadyActive(_)));
    }

    #[test]
    fn every_table_entry_parses() {
        for c in COMMANDS {
            let parsed = parse(&format!("/{}", c.primary));
            match c.primary {
                // Needs an argument
                "answer" => assert!(parsed.is_err()),
                _ => assert!(parsed.is_ok(), "/{} did not parse", c.primary),
            }
        }
        assert_eq!(parse("/help").unwrap(), SlashCommand::Help);
        assert_eq!(parse("/?").unwrap(), SlashCommand::Help);
        assert_eq!(
            parse("/code-review src/auth.rs").unwrap(),
            SlashCommand::CodeReview {
                context: "src/auth.rs".into()
            }
        );
        assert_eq!(
            parse("/review").unwrap(),
            SlashCommand::CodeReview {
                context: String::new()
            }
        );
    }

    #[test]
    fn code_review_hands_off_to_reviewers() {
        let mut pm = PlanModeManager::new();
        let mut wf = WorkflowManager::new();
        let out = CommandRouter::new(&mut pm, &mut wf)
            .handle(parse("/code-review the auth module").unwrap())
            .unwrap();
        assert_eq!(
            out.followup,
            Some(Followup::RunReview("the auth module".into()))
        );
    }

    #[test]
    fn help_lists_every_command() {
        let text = help_text();
        for c in COMMANDS {
            assert!(text.contains(c.usage));
        }
    }
}
