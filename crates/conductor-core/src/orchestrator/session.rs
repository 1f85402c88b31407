//! Conversation driver
//!
//! One `Session` owns the plan and workflow managers, the shared hook
//! pipeline, and the model and tool capabilities. Each operator input is
//! either a slash command, a planning request (plan mode), or a regular turn
//! in which the model may call tools through the gated runner.

use std::collections::VecDeque;
use std::sync::Arc;

use super::commands::{CommandRouter, Followup, SlashCommand};
use super::llm::{ChatMessage, LanguageModel, PromptContext};
use super::tools::{GatedToolRunner, ToolExecutor};
use crate::config::ConductorConfig;
use crate::dispatch::{
    format_review_report, AgentInvoker, AgentRole, ModelAgentInvoker, ParallelAgentDispatcher,
};
use crate::error::{OrchestrationError, Result};
use crate::events::Notification;
use crate::hooks::HookPipeline;
use crate::plan::render::{format_plan_summary, format_questions};
use crate::plan::{parse_planner_response, OperatingMode, PlanModeManager, PLANNER_SYSTEM_PROMPT};
use crate::workflow::{default_tasks_for, run_phase_agents, WorkflowManager};

/// Upper bound on model calls per operator input
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

const DEFAULT_REVIEW_CONTEXT: &str = "The uncommitted changes in the current working tree.";

const BASE_SYSTEM_PROMPT: &str = "You are a careful coding agent. Explain why a tool is needed \
before calling it, then observe the result and adjust. When a tool call is blocked, read the \
reason and choose a different action.";

/// What one operator input produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Model text, one entry per model call that said something
    pub replies: Vec<String>,
    pub tools_run: usize,
    pub tools_blocked: usize,
}

pub struct Session {
    id: String,
    plan: PlanModeManager,
    workflow: WorkflowManager,
    hooks: Arc<HookPipeline>,
    dispatcher: ParallelAgentDispatcher,
    model: Arc<dyn LanguageModel>,
    invoker: Arc<dyn AgentInvoker>,
    tools: GatedToolRunner,
    history: Vec<ChatMessage>,
    notifications: VecDeque<Notification>,
    max_tool_rounds: usize,
}

impl Session {
    pub fn new(
        hooks: Arc<HookPipeline>,
        model: Arc<dyn LanguageModel>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            id: hooks.session_id().to_string(),
            plan: PlanModeManager::new(),
            workflow: WorkflowManager::new(),
            tools: GatedToolRunner::new(hooks.clone(), executor),
            hooks,
            dispatcher: ParallelAgentDispatcher::default(),
            invoker: Arc::new(ModelAgentInvoker::new(model.clone())),
            model,
            history: Vec::new(),
            notifications: VecDeque::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Build hooks and dispatcher from configuration
    pub fn from_config(
        config: &ConductorConfig,
        session_id: impl Into<String>,
        model: Arc<dyn LanguageModel>,
        executor: Arc<dyn ToolExecutor>,
    ) -> anyhow::Result<Self> {
        let hooks = Arc::new(HookPipeline::from_config(config, session_id)?);
        Ok(Self::new(hooks, model, executor)
            .with_dispatcher(ParallelAgentDispatcher::new(config.dispatch_config())))
    }

    pub fn with_dispatcher(mut self, dispatcher: ParallelAgentDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Replace the model-backed agent invoker
    pub fn with_invoker(mut self, invoker: Arc<dyn AgentInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.plan.set_mode(mode);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plan(&self) -> &PlanModeManager {
        &self.plan
    }

    pub fn workflow(&self) -> &WorkflowManager {
        &self.workflow
    }

    pub fn hooks(&self) -> &Arc<HookPipeline> {
        &self.hooks
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Drain operator notifications, oldest first
    pub fn pop_notifications(&mut self) -> Vec<Notification> {
        self.collect_workflow_notes();
        self.notifications.drain(..).collect()
    }

    fn notify(&mut self, n: Notification) {
        self.notifications.push_back(n);
    }

    fn collect_workflow_notes(&mut self) {
        let notes = self.workflow.pop_notifications();
        self.notifications.extend(notes);
    }

    /// Handle one line of operator input.
    ///
    /// Command and state errors are returned unchanged; hook vetoes are
    /// absorbed into the turn and reported as notifications.
    pub async fn handle_input(&mut self, input: &str) -> Result<TurnOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnOutcome::default());
        }

        if let Some(cmd) = SlashCommand::parse(input) {
            return self.handle_command(cmd?).await;
        }

        if self.plan.is_plan_mode() {
            if self.plan.has_active_plan() {
                self.notify(Notification::warning(
                    "A plan is already active. Answer it with /answer, run it with /execute-plan, \
                     or discard it with /clear-plan.",
                ));
                return Ok(TurnOutcome::default());
            }
            return self.request_plan(input).await;
        }

        self.run_turn(ChatMessage::user(input)).await
    }

    async fn handle_command(&mut self, cmd: SlashCommand) -> Result<TurnOutcome> {
        let outcome = CommandRouter::new(&mut self.plan, &mut self.workflow).handle(cmd)?;
        self.notifications.extend(outcome.notifications);

        match outcome.followup {
            Some(Followup::Prompt(msg)) => self.run_turn(msg).await,
            Some(Followup::RunPhaseAgents) => {
                let run = run_phase_agents(
                    &mut self.workflow,
                    &self.dispatcher,
                    self.invoker.as_ref(),
                    Vec::new(),
                )
                .await?;
                self.collect_workflow_notes();
                Ok(TurnOutcome {
                    replies: run
                        .results
                        .iter()
                        .filter(|r| r.is_success())
                        .map(|r| r.output.clone())
                        .collect(),
                    ..TurnOutcome::default()
                })
            }
            Some(Followup::RunReview(context)) => self.run_code_review(&context).await,
            None => Ok(TurnOutcome::default()),
        }
    }

    /// Default reviewers in parallel; only confident, de-duplicated issues
    /// reach the operator
    async fn run_code_review(&mut self, context: &str) -> Result<TurnOutcome> {
        let context = if context.trim().is_empty() {
            DEFAULT_REVIEW_CONTEXT
        } else {
            context.trim()
        };
        let tasks = default_tasks_for(AgentRole::Reviewer, "", context);
        let report = self
            .dispatcher
            .dispatch_review(&tasks, self.invoker.as_ref())
            .await;

        let failed = report.failed_count();
        if failed > 0 {
            self.notify(Notification::warning(format!(
                "{failed} of {} reviewer(s) failed",
                report.results.len()
            )));
        }
        self.notify(Notification::panel("Code Review", format_review_report(&report)));
        Ok(TurnOutcome {
            replies: report
                .results
                .iter()
                .filter(|r| r.is_success())
                .map(|r| r.output.clone())
                .collect(),
            ..TurnOutcome::default()
        })
    }

    /// Ask the model for an interactive plan and install it
    async fn request_plan(&mut self, request: &str) -> Result<TurnOutcome> {
        let prompt = PromptContext::single(Some(PLANNER_SYSTEM_PROMPT.to_string()), request);
        let response = self.model.invoke(&prompt).await?;
        let plan = parse_planner_response(&response.text)?;

        let summary = format_plan_summary(&plan);
        let questions = format_questions(plan.questions());
        let open = plan.questions().len();
        self.plan.begin_plan(plan)?;
        self.history.push(ChatMessage::user(request));

        self.notify(Notification::panel("Plan", summary));
        if open == 0 {
            self.notify(Notification::info("No questions. Use /execute-plan to run."));
        } else {
            self.notify(Notification::panel("Questions", questions));
        }
        Ok(TurnOutcome {
            replies: vec![response.text],
            ..TurnOutcome::default()
        })
    }

    fn system_prompt(&self) -> String {
        match self.workflow.system_prompt() {
            Some(workflow) => format!("{BASE_SYSTEM_PROMPT}\n\n{workflow}"),
            None => BASE_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Send `message` and follow tool calls until the model stops asking
    async fn run_turn(&mut self, message: ChatMessage) -> Result<TurnOutcome> {
        self.history.push(message);
        let mut outcome = TurnOutcome::default();

        for round in 0..self.max_tool_rounds {
            let prompt = PromptContext::new(Some(self.system_prompt()), self.history.clone());
            let response = self.model.invoke(&prompt).await?;

            if !response.text.is_empty() {
                self.history.push(ChatMessage::assistant(response.text.clone()));
                outcome.replies.push(response.text);
            }
            let Some(call) = response.tool_call else {
                return Ok(outcome);
            };

            tracing::debug!(round, tool = %call.name, "Model requested tool");
            match self.tools.run(&call.name, &call.input).await {
                Ok(run) => {
                    outcome.tools_run += 1;
                    for notice in run.notices {
                        self.notify(Notification::warning(format!(
                            "[{}] {}",
                            notice.hook, notice.message
                        )));
                    }
                    self.history.push(ChatMessage::tool(call.name, run.output));
                }
                Err(OrchestrationError::HookBlocked {
                    tool,
                    messages,
                    warnings,
                }) => {
                    outcome.tools_blocked += 1;
                    for notice in warnings {
                        self.notify(Notification::warning(format!(
                            "[{}] {}",
                            notice.hook, notice.message
                        )));
                    }
                    for m in &messages {
                        self.notify(Notification::warning(format!("Blocked {tool}: {m}")));
                    }
                    let feedback = format!(
                        "Tool call was blocked and did not run.\n{}",
                        messages.join("\n")
                    );
                    self.history.push(ChatMessage::tool(tool, feedback));
                }
                Err(OrchestrationError::ExternalService(reason)) => {
                    self.notify(Notification::warning(format!("Tool {} failed: {reason}", call.name)));
                    self.history
                        .push(ChatMessage::tool(call.name, format!("Error: {reason}")));
                }
                Err(other) => return Err(other),
            }
        }

        tracing::warn!(rounds = self.max_tool_rounds, "Tool round limit reached");
        self.notify(Notification::warning(format!(
            "Stopped after {} tool rounds.",
            self.max_tool_rounds
        )));
        Ok(outcome)
    }
}
