use anyhow::{Context, Result};
use std::fmt::Write;

use crate::audit::{Outcome, Report};

/// Human-readable report: one line per rule, findings indented beneath
/// failures, then a summary line.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "Audit of {} at {}",
        report.project,
        report.evaluated_at.format("%Y-%m-%d %H:%M UTC")
    );
    match &report.current_increment {
        Some(pi) => {
            let _ = writeln!(out, " ({pi})");
        }
        None => out.push('\n'),
    }
    for result in &report.results {
        match &result.outcome {
            Outcome::Passed => {
                let _ = writeln!(out, "PASS {}  {}", result.rule_id, result.description);
            }
            Outcome::Failed { findings } => {
                let _ = writeln!(
                    out,
                    "FAIL {}  {} ({} finding{})",
                    result.rule_id,
                    result.description,
                    findings.len(),
                    if findings.len() == 1 { "" } else { "s" }
                );
                for finding in findings {
                    let _ = writeln!(out, "     - {}", finding.message);
                }
            }
            Outcome::Skipped { reason } => {
                let _ = writeln!(out, "SKIP {}  {reason}", result.rule_id);
            }
        }
    }
    let _ = writeln!(
        out,
        "\n{} passed, {} failed, {} skipped, {} findings",
        report.count(|o| matches!(o, Outcome::Passed)),
        report.count(|o| matches!(o, Outcome::Failed { .. })),
        report.count(|o| matches!(o, Outcome::Skipped { .. })),
        report.findings().count()
    );
    out
}

pub fn render_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Evaluator;
    use crate::model::fixtures::{at_days_ago, issue, snapshot};
    use crate::model::issue::Status;

    fn report() -> Report {
        let mut evaluator = Evaluator::default();
        evaluator.retain(&[
            "stale-issues".to_string(),
            "wip-limit".to_string(),
            "full-coverage".to_string(),
        ]);
        let mut stale = issue("K-1", Status::ToDo);
        stale.updated_at = at_days_ago(45);
        evaluator.evaluate(&snapshot(vec![stale])).unwrap()
    }

    #[test]
    fn text_report_lists_every_rule() {
        let text = render_text(&report());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Audit of K at 2025-06-15 12:00 UTC (PI10)");
        assert!(lines[1].starts_with("FAIL stale-issues"));
        assert!(lines[1].ends_with("(1 finding)"));
        assert!(lines[2].contains("K-1 ('Summary of K-1'), assigned to ann, has been To Do for 45 days"));
        assert!(lines[3].starts_with("PASS wip-limit"));
        assert!(lines[4].starts_with("SKIP full-coverage"));
        assert_eq!(
            lines.last().copied(),
            Some("1 passed, 1 failed, 1 skipped, 1 findings")
        );
    }

    #[test]
    fn json_report_tags_outcomes() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&report()).unwrap()).unwrap();
        let results = json["results"].as_array().unwrap();
        assert_eq!(results[0]["rule_id"], "stale-issues");
        assert_eq!(results[0]["outcome"], "failed");
        assert_eq!(results[0]["findings"][0]["issue_key"], "K-1");
        assert_eq!(results[1]["outcome"], "passed");
        assert_eq!(results[2]["outcome"], "skipped");
        assert!(results[2]["reason"].is_string());
    }
}
