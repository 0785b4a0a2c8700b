use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::model::snapshot::{Snapshot, SnapshotError};
use crate::rules::{catalog, AuditContext, Finding, Rule, Thresholds};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed { findings: Vec<Finding> },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    pub rule_id: &'static str,
    pub description: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub project: String,
    pub evaluated_at: DateTime<Utc>,
    /// Name of the planning increment containing `evaluated_at`.
    pub current_increment: Option<String>,
    pub results: Vec<RuleResult>,
}

impl Report {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.results.iter().flat_map(|r| match &r.outcome {
            Outcome::Failed { findings } => findings.as_slice(),
            _ => Default::default(),
        })
    }

    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// No rule produced a finding. Skipped rules do not count against this.
    pub fn is_clean(&self) -> bool {
        self.count(|o| matches!(o, Outcome::Failed { .. })) == 0
    }
}

/// Runs a set of rules over snapshots.
pub struct Evaluator {
    rules: Vec<Box<dyn Rule>>,
    thresholds: Thresholds,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl Evaluator {
    /// An evaluator carrying the full built-in catalog.
    pub fn new(thresholds: Thresholds) -> Self {
        let mut evaluator = Self {
            rules: Vec::new(),
            thresholds,
        };
        for rule in catalog() {
            evaluator.register(rule);
        }
        evaluator
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Keep only the named rules. Returns the names that matched nothing.
    pub fn retain(&mut self, ids: &[String]) -> Vec<String> {
        let unknown = ids
            .iter()
            .filter(|id| !self.rules.iter().any(|r| r.id() == id.as_str()))
            .cloned()
            .collect();
        self.rules.retain(|r| ids.iter().any(|id| id == r.id()));
        unknown
    }

    /// Validate the snapshot, then run every rule over it.
    pub fn evaluate(&self, snapshot: &Snapshot) -> Result<Report, SnapshotError> {
        snapshot.validate()?;
        let ctx = AuditContext::new(snapshot, &self.thresholds);

        let results: Vec<RuleResult> = self
            .rules
            .iter()
            .map(|rule| run_rule(rule.as_ref(), &ctx))
            .collect();

        let report = Report {
            project: snapshot.project.clone(),
            evaluated_at: snapshot.now,
            current_increment: ctx.clock.current().map(|pi| pi.name.clone()),
            results,
        };
        info!(
            project = %report.project,
            passed = report.count(|o| matches!(o, Outcome::Passed)),
            failed = report.count(|o| matches!(o, Outcome::Failed { .. })),
            skipped = report.count(|o| matches!(o, Outcome::Skipped { .. })),
            "audit complete"
        );
        Ok(report)
    }
}

fn run_rule(rule: &dyn Rule, ctx: &AuditContext<'_>) -> RuleResult {
    let outcome = if rule.requires_elevated_access() && !ctx.snapshot.has_elevated_access {
        Outcome::Skipped {
            reason: "no permission to read the membership of this project".into(),
        }
    } else {
        let mut findings: Vec<Finding> = rule
            .check(ctx)
            .into_iter()
            .map(|v| v.into_finding(rule.id()))
            .collect();
        findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        if findings.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed { findings }
        }
    };
    debug!(rule = rule.id(), ?outcome, "rule evaluated");
    RuleResult {
        rule_id: rule.id(),
        description: rule.description(),
        outcome,
    }
}

/// Audit a snapshot with the built-in catalog and default thresholds.
pub fn evaluate(snapshot: &Snapshot) -> Result<Report, SnapshotError> {
    Evaluator::default().evaluate(snapshot)
}
