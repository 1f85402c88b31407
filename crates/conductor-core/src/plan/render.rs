//! Plain-text plan rendering for the shell

use super::types::{InteractivePlan, PlanQuestion};

const RULE_WIDTH: usize = 80;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Steps with their ids, framed by rules
pub fn format_plan_summary(plan: &InteractivePlan) -> String {
    let mut lines = vec![
        rule(),
        "EXECUTION PLAN".to_string(),
        rule(),
        String::new(),
        format!("Mode: {}", plan.execution_mode().as_str()),
        String::new(),
        "Steps:".to_string(),
    ];
    for (i, step) in plan.steps().iter().enumerate() {
        lines.push(format!("{}. [{}] {}", i + 1, step.id, step.description));
    }
    lines.push(String::new());
    lines.push(rule());
    lines.join("\n")
}

/// Questions grouped by category, first-seen category order
pub fn format_questions(questions: &[PlanQuestion]) -> String {
    if questions.is_empty() {
        return "No questions to answer.".to_string();
    }

    let mut groups: Vec<(&str, Vec<&PlanQuestion>)> = Vec::new();
    for q in questions {
        let category = if q.category.is_empty() {
            "general"
        } else {
            q.category.as_str()
        };
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, qs)) => qs.push(q),
            None => groups.push((category, vec![q])),
        }
    }

    let mut lines = vec![rule(), "PLAN QUESTIONS".to_string(), rule(), String::new()];
    for (category, qs) in groups {
        lines.push(format!("[{}]", category.to_uppercase()));
        lines.push(String::new());
        for q in qs {
            lines.push(format!("Question {}: {}", q.id, q.prompt));
            if !q.choices.is_empty() {
                lines.push("Choices:".to_string());
            }
            for (i, choice) in q.choices.iter().enumerate() {
                let marker = if q.default_choice.as_deref() == Some(choice.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                lines.push(format!("  {}. {}{}", i + 1, choice, marker));
            }
            if q.allow_custom_answer {
                lines.push(format!("  {}. Custom (enter your own)", q.choices.len() + 1));
            }
            lines.push(String::new());
        }
    }
    lines.push("Answer with /answer <id>:<value>".to_string());
    lines.push(rule());
    lines.join("\n")
}

/// One line per question with its answer, or a marker if unanswered
pub fn format_question_status(plan: &InteractivePlan) -> String {
    plan.questions()
        .iter()
        .map(|q| match plan.answer(&q.id) {
            Some(a) if a.is_custom => format!("[x] {}: {} (custom)", q.id, a.value),
            Some(a) => format!("[x] {}: {}", q.id, a.value),
            None => format!("[ ] {}: {}", q.id, q.prompt),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{ExecutionMode, PlanStep};

    #[test]
    fn questions_grouped_with_default_marker() {
        let questions = vec![
            PlanQuestion::new("q1", "Framework?")
                .with_choices(["axum", "actix"])
                .with_default("axum")
                .with_category("approach"),
            PlanQuestion::new("q2", "Coverage target?").with_category("testing"),
            PlanQuestion::new("q3", "Layering?")
                .with_category("approach")
                .allow_custom(false)
                .with_choices(["flat"]),
        ];
        let text = format_questions(&questions);

        let approach = text.find("[APPROACH]").unwrap();
        let testing = text.find("[TESTING]").unwrap();
        let q3 = text.find("Question q3").unwrap();
        assert!(approach < q3 && q3 < testing);
        assert!(text.contains("  1. axum (default)"));
        assert!(text.contains("  3. Custom (enter your own)"));
        assert!(!text.contains("  2. Custom"));
    }

    #[test]
    fn empty_question_list() {
        assert_eq!(format_questions(&[]), "No questions to answer.");
    }

    #[test]
    fn status_marks_answered_questions() {
        let mut plan = InteractivePlan::new(
            ExecutionMode::Single,
            vec![PlanStep::new("s1", "go")],
            vec![PlanQuestion::new("q1", "a?"), PlanQuestion::new("q2", "b?")],
        )
        .unwrap();
        plan.record_answer("q2", "mine", true).unwrap();

        let status = format_question_status(&plan);
        assert_eq!(status, "[ ] q1: a?\n[x] q2: mine (custom)");
        assert!(format_plan_summary(&plan).contains("1. [s1] go"));
    }
}
