//! Confidence filtering and review aggregation

use std::collections::HashMap;

use serde::Serialize;

use super::types::{AgentResult, Finding};

/// Findings below this score are not surfaced to the operator
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 80;

/// Keep findings with `confidence >= threshold`, preserving order
pub fn filter_by_confidence(findings: &[Finding], threshold: u8) -> Vec<Finding> {
    findings
        .iter()
        .filter(|f| f.confidence >= threshold)
        .cloned()
        .collect()
}

/// Merge findings sharing `(location, description)`.
///
/// The surviving entry sits at the first occurrence's position and carries
/// the highest-confidence instance (earliest wins on ties).
pub fn dedupe_findings(findings: impl IntoIterator<Item = Finding>) -> Vec<Finding> {
    let mut out: Vec<Finding> = Vec::new();
    let mut slots: HashMap<(String, String), usize> = HashMap::new();

    for finding in findings {
        let key = (
            finding.location.trim().to_string(),
            finding.description.trim().to_string(),
        );
        match slots.get(&key) {
            Some(&idx) => {
                if finding.confidence > out[idx].confidence {
                    out[idx] = finding;
                }
            }
            None => {
                slots.insert(key, out.len());
                out.push(finding);
            }
        }
    }

    out
}

/// Aggregated outcome of a review dispatch
#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    /// Per-reviewer results, input order
    pub results: Vec<AgentResult>,
    /// Filtered and de-duplicated findings across all reviewers
    pub findings: Vec<Finding>,
    pub threshold: u8,
    /// Findings dropped for low confidence (before de-duplication)
    pub suppressed: usize,
}

impl ReviewReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

/// Filter every reviewer's findings, then merge duplicates across reviewers
pub fn aggregate_review(results: Vec<AgentResult>, threshold: u8) -> ReviewReport {
    let all: Vec<Finding> = results
        .iter()
        .flat_map(|r| r.findings.iter().cloned())
        .collect();
    let kept = filter_by_confidence(&all, threshold);
    let suppressed = all.len() - kept.len();

    ReviewReport {
        results,
        findings: dedupe_findings(kept),
        threshold,
        suppressed,
    }
}

/// Plain-text listing for the operator
pub fn format_review_report(report: &ReviewReport) -> String {
    let mut lines = vec![format!(
        "{} finding(s) at confidence >= {} ({} suppressed, {} reviewer(s) failed)",
        report.findings.len(),
        report.threshold,
        report.suppressed,
        report.failed_count()
    )];
    for f in &report.findings {
        lines.push(format!(
            "- [{}] {} ({}%): {}",
            f.severity.as_str(),
            f.location,
            f.confidence,
            f.description
        ));
        if let Some(fix) = &f.suggested_fix {
            lines.push(format!("  fix: {fix}"));
        }
    }
    lines.join("\n")
}
