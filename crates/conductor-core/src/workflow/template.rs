//! Workflow templates
//!
//! A template is a fixed, linear list of phases. The built-in catalog
//! currently holds the seven-phase `feature-dev` flow.

use serde::Serialize;

use crate::dispatch::AgentRole;

/// One step of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowPhase {
    /// Zero-based position within the template
    pub index: usize,
    /// Stable identifier, e.g. `discovery`
    pub key: String,
    pub name: String,
    /// One-line goal shown when the phase starts
    pub focus: String,
    /// Guidance appended to the system prompt
    pub instructions: String,
    /// Advancing out of this phase needs an explicit confirmation
    pub requires_confirmation: bool,
    /// Parallel agents this phase launches, if any
    pub agent_role: Option<AgentRole>,
}

impl WorkflowPhase {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: 0,
            key: key.into(),
            name: name.into(),
            focus: String::new(),
            instructions: String::new(),
            requires_confirmation: false,
            agent_role: None,
        }
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = focus.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn gated(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn with_agents(mut self, role: AgentRole) -> Self {
        self.agent_role = Some(role);
        self
    }
}

/// An ordered set of phases plus the rules that apply to all of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowTemplate {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub rules: Vec<String>,
    phases: Vec<WorkflowPhase>,
}

impl WorkflowTemplate {
    /// Build a template; phase indices are assigned from list order
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        phases: Vec<WorkflowPhase>,
    ) -> Self {
        let phases = phases
            .into_iter()
            .enumerate()
            .map(|(index, mut phase)| {
                phase.index = index;
                phase
            })
            .collect();
        Self {
            slug: slug.into(),
            title: title.into(),
            description: String::new(),
            rules: Vec::new(),
            phases,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn phases(&self) -> &[WorkflowPhase] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<&WorkflowPhase> {
        self.phases.get(index)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// The seven-phase feature development flow
    pub fn feature_dev() -> Self {
        let phases = vec![
            WorkflowPhase::new("discovery", "Discovery")
                .with_focus("Understand the problem and constraints.")
                .with_instructions(
                    "Restate the feature request, capture constraints, and list unknowns. \
                     End with a checklist the user can confirm.",
                )
                .gated(),
            WorkflowPhase::new("exploration", "Codebase Exploration")
                .with_focus("Map relevant files and existing implementations.")
                .with_instructions(
                    "Trace similar features, architecture layers, and integration points. \
                     Cite concrete paths and line numbers.",
                )
                .with_agents(AgentRole::Explorer),
            WorkflowPhase::new("clarifying_questions", "Clarifying Questions")
                .with_focus("Resolve ambiguities before designing.")
                .with_instructions(
                    "Ask targeted questions on edge cases, integrations, error handling, and \
                     backward compatibility. Wait for answers.",
                )
                .gated(),
            WorkflowPhase::new("architecture", "Architecture Design")
                .with_focus("Present multiple approaches and pick one.")
                .with_instructions(
                    "Compare a minimal change, a clean design, and a pragmatic balance. \
                     Ask the user to choose.",
                )
                .gated()
                .with_agents(AgentRole::Architect),
            WorkflowPhase::new("implementation", "Implementation")
                .with_focus("Execute the chosen plan safely.")
                .with_instructions(
                    "Get explicit approval before touching files, then implement incrementally.",
                )
                .gated(),
            WorkflowPhase::new("quality_review", "Quality Review")
                .with_focus("Launch specialized review passes.")
                .with_instructions(
                    "Review for simplicity, bugs, and conventions. Report issues with severity \
                     and confidence, then ask whether to fix now or defer.",
                )
                .gated()
                .with_agents(AgentRole::Reviewer),
            WorkflowPhase::new("summary", "Summary")
                .with_focus("Document what was built and next steps.")
                .with_instructions(
                    "Summarize the work, key decisions, touched files, test status, and follow-ups.",
                ),
        ];

        WorkflowTemplate::new("feature-dev", "Feature Development Workflow", phases)
            .with_description(
                "Seven explicit phases for large coding tasks that need planning, \
                 architecture choices, implementation, review, and documentation.",
            )
            .with_rules([
                "Announce the active phase as 'PHASE X – Name' at the top of each reply.",
                "Do not skip phases. Wait for the user whenever a phase needs approval.",
                "Cite files with path:line references when summarizing findings.",
            ])
    }

    /// Look up a built-in template; `_` and `-` are interchangeable
    pub fn builtin(slug: &str) -> Option<Self> {
        match slug.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "feature-dev" => Some(Self::feature_dev()),
            _ => None,
        }
    }

    /// Slugs of every built-in template
    pub fn builtin_slugs() -> &'static [&'static str] {
        &["feature-dev"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_dev_layout() {
        let t = WorkflowTemplate::feature_dev();
        assert_eq!(t.len(), 7);

        let gated: Vec<usize> = t
            .phases()
            .iter()
            .filter(|p| p.requires_confirmation)
            .map(|p| p.index)
            .collect();
        assert_eq!(gated, vec![0, 2, 3, 4, 5]);

        assert_eq!(t.phase(1).unwrap().agent_role, Some(AgentRole::Explorer));
        assert_eq!(t.phase(3).unwrap().agent_role, Some(AgentRole::Architect));
        assert_eq!(t.phase(5).unwrap().agent_role, Some(AgentRole::Reviewer));
        assert_eq!(t.phase(6).unwrap().name, "Summary");
    }

    #[test]
    fn indices_follow_order() {
        let t = WorkflowTemplate::new(
            "x",
            "X",
            vec![WorkflowPhase::new("a", "A"), WorkflowPhase::new("b", "B")],
        );
        assert_eq!(t.phase(1).unwrap().index, 1);
    }

    #[test]
    fn builtin_lookup() {
        assert!(WorkflowTemplate::builtin("feature_dev").is_some());
        assert!(WorkflowTemplate::builtin("Feature-Dev").is_some());
        assert!(WorkflowTemplate::builtin("nope").is_none());
    }
}
