//! Structured data extraction from agent markdown output
//!
//! Agents answer in loosely formatted markdown. These helpers pull out the
//! parts the workflow stores: reviewer issues, explorer key files, and the
//! architect's complexity/effort/risk self-assessment.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ArchitectAssessment, Finding, Severity};

static KEY_FILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9\-*.]+\s+`?([A-Za-z0-9_/.\-]+\.[A-Za-z0-9]+)").unwrap());
static LEADING_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Value after the first ':' with markdown emphasis and code ticks removed
fn field_value(line: &str) -> String {
    line.split_once(':')
        .map(|(_, v)| v)
        .unwrap_or("")
        .replace(['`', '*'], "")
        .trim()
        .to_string()
}

/// Lower-cased field label if the line looks like `- **Label**: value`
fn field_label(line: &str) -> Option<String> {
    let (label, _) = line.split_once(':')?;
    let label = label
        .trim_start_matches(['-', '*', ' '])
        .trim_end_matches(['*', ' '])
        .to_ascii_lowercase();
    (!label.is_empty() && label.len() <= 20).then_some(label)
}

#[derive(Default)]
struct PendingIssue {
    description: String,
    location: String,
    severity: Severity,
    confidence: Option<u8>,
    suggestion: Option<String>,
}

impl PendingIssue {
    fn finish(self) -> Option<Finding> {
        // Issues without a confidence score are not actionable
        let confidence = self.confidence.filter(|c| *c > 0)?;
        let mut finding = Finding::new(self.location, self.description, self.severity, confidence);
        finding.suggested_fix = self.suggestion.filter(|s| !s.is_empty());
        Some(finding)
    }
}

/// Parse `#### Issue N: ...` blocks from reviewer output
pub fn extract_review_issues(content: &str) -> Vec<Finding> {
    let mut issues = Vec::new();
    let mut current: Option<PendingIssue> = None;

    for raw in content.lines() {
        let line = raw.trim();

        if line.starts_with("####") || (line.starts_with("**Issue") && line.len() > 8) {
            if let Some(done) = current.take().and_then(PendingIssue::finish) {
                issues.push(done);
            }
            let heading = line.trim_start_matches('#').replace("**", "");
            let description = match heading.split_once(':') {
                Some((_, rest)) => rest.trim().to_string(),
                None => heading.trim().to_string(),
            };
            current = Some(PendingIssue {
                description,
                ..Default::default()
            });
            continue;
        }

        let Some(issue) = current.as_mut() else {
            continue;
        };
        let Some(label) = field_label(line) else {
            continue;
        };
        match label.as_str() {
            "location" => issue.location = field_value(line),
            "severity" => {
                if let Some(s) = Severity::parse(&field_value(line)) {
                    issue.severity = s;
                }
            }
            "confidence" => {
                issue.confidence = LEADING_INT
                    .find(&field_value(line))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .map(|c| c.min(100) as u8);
            }
            "suggestion" | "fix" => issue.suggestion = Some(field_value(line)),
            "description" => issue.description = field_value(line),
            _ => {}
        }
    }

    if let Some(done) = current.and_then(PendingIssue::finish) {
        issues.push(done);
    }
    issues
}

/// File paths listed under a "Key Files" heading
pub fn extract_key_files(content: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut in_section = false;

    for raw in content.lines() {
        let line = raw.trim();
        let lower = line.to_ascii_lowercase();

        if lower.contains("key files") || lower.contains("files to read") {
            in_section = true;
            continue;
        }
        if in_section && (line.starts_with("##") || line.starts_with("**")) {
            in_section = false;
        }
        if !in_section || line.is_empty() {
            continue;
        }
        if let Some(caps) = KEY_FILE_PATTERN.captures(line) {
            let path = caps[1].to_string();
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    files
}

/// `## Complexity: 3/5`, `**Effort:** small`, `## Risk: high` lines
pub fn extract_architect_assessment(content: &str) -> ArchitectAssessment {
    let mut assessment = ArchitectAssessment::default();

    for raw in content.lines() {
        let line = raw.trim().to_ascii_lowercase();
        let Some(label) = field_label(line.trim_start_matches('#')) else {
            continue;
        };
        let value = field_value(&line);

        match label.as_str() {
            "complexity" => {
                assessment.complexity = LEADING_INT
                    .find(&value)
                    .and_then(|m| m.as_str().parse::<u8>().ok())
                    .map(|c| c.clamp(1, 5));
            }
            "effort" => {
                let effort = if value.contains("small") {
                    "small"
                } else if value.contains("large") {
                    "large"
                } else {
                    "medium"
                };
                assessment.effort = Some(effort.to_string());
            }
            "risk" => {
                let risk = if value.contains("low") {
                    "low"
                } else if value.contains("high") {
                    "high"
                } else {
                    "medium"
                };
                assessment.risk = Some(risk.to_string());
            }
            _ => {}
        }
    }

    assessment
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW: &str = r#"## Review Focus: bugs

### Issues Found

#### Issue 1: Unchecked index into results
- **Location**: `src/dispatch.rs:42`
- **Severity**: high
- **Confidence**: 91
- **Reason**: panics on empty input
- **Suggestion**: use get()

#### Issue 2: Style nit
- **Location**: `src/lib.rs:3`
- **Severity**: low
- **Confidence**: 35/100

#### Issue 3: No score given
- **Location**: `src/x.rs:1`

## Summary
2 issues
"#;

    #[test]
    fn review_issues_parsed() {
        let issues = extract_review_issues(REVIEW);
        assert_eq!(issues.len(), 2);

        assert_eq!(issues[0].description, "Unchecked index into results");
        assert_eq!(issues[0].location, "src/dispatch.rs:42");
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].confidence, 91);
        assert_eq!(issues[0].suggested_fix.as_deref(), Some("use get()"));

        assert_eq!(issues[1].severity, Severity::Low);
        assert_eq!(issues[1].confidence, 35);
        assert_eq!(issues[1].suggested_fix, None);
    }

    #[test]
    fn no_issues_found() {
        let text = "## Review Focus: conventions\n\nNo issues found in this review pass.";
        assert!(extract_review_issues(text).is_empty());
    }

    #[test]
    fn key_files_section() {
        let text = "## Analysis\nstuff in src/ignored.rs\n\n## Key Files to Read\n1. src/main.rs:10 - entry\n2. `crates/core/lib.rs` - exports\n- docs/design.md - notes\n1. src/main.rs:40 - again\n\n## Summary\n- src/after.rs - not listed";
        assert_eq!(
            extract_key_files(text),
            vec!["src/main.rs", "crates/core/lib.rs", "docs/design.md"]
        );
    }

    #[test]
    fn architect_assessment() {
        let text = "## Approach: clean\n## Complexity: 4/5\n**Effort:** Large, several days\n## Risk: Low";
        let a = extract_architect_assessment(text);
        assert_eq!(a.complexity, Some(4));
        assert_eq!(a.effort.as_deref(), Some("large"));
        assert_eq!(a.risk.as_deref(), Some("low"));
    }
}
