pub mod assignment;
pub mod content;
pub mod delivery;
pub mod linkage;
pub mod skb;
pub mod staleness;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::links::LinkGraph;
use crate::engine::temporal::TemporalClassifier;
use crate::engine::workload::Workload;
use crate::model::issue::{Issue, Status};
use crate::model::snapshot::Snapshot;

/// Limits the catalog checks against. Every field can be overridden from
/// the `[thresholds]` table of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub backlog_max_age_days: u32,
    pub todo_max_age_days: u32,
    pub active_max_age_days: u32,
    pub rfa_max_age_days: u32,
    /// When false, epics in To Do or In Progress are not aged.
    pub age_in_flight_epics: bool,
    pub max_wip: usize,
    pub max_blocked: usize,
    pub max_rfa: usize,
    /// Keyed by SKB workflow status name. Statuses not listed are not aged.
    pub skb_max_age_days: BTreeMap<String, u32>,
}

impl Default for Thresholds {
    fn default() -> Self {
        let skb_max_age_days = [
            ("Identified", 7),
            ("Assessment", 7),
            ("Assigned", 14),
            ("In Progress", 30),
            ("BLOCKED", 7),
            ("Verifying", 2),
            ("Validating", 2),
        ]
        .into_iter()
        .map(|(status, days)| (status.to_string(), days))
        .collect();

        Self {
            backlog_max_age_days: 90,
            todo_max_age_days: 30,
            active_max_age_days: 30,
            rfa_max_age_days: 7,
            age_in_flight_epics: true,
            max_wip: 4,
            max_blocked: 2,
            max_rfa: 9,
            skb_max_age_days,
        }
    }
}

/// What a rule reports: the issue or person at fault and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub issue_key: Option<String>,
    pub assignee: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn issue(issue: &Issue, message: impl Into<String>) -> Self {
        Self {
            issue_key: Some(issue.key.clone()),
            assignee: issue.assignee.clone(),
            message: message.into(),
        }
    }

    pub fn assignee(user_id: &str, message: impl Into<String>) -> Self {
        Self {
            issue_key: None,
            assignee: Some(user_id.to_string()),
            message: message.into(),
        }
    }

    pub fn project(message: impl Into<String>) -> Self {
        Self {
            issue_key: None,
            assignee: None,
            message: message.into(),
        }
    }

    pub fn into_finding(self, rule_id: &'static str) -> Finding {
        Finding {
            rule_id,
            issue_key: self.issue_key,
            assignee: self.assignee,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub message: String,
}

impl Finding {
    /// Report order: project-wide findings first, then by issue key with
    /// the numeric part compared as a number, then by assignee.
    pub fn sort_key(&self) -> (Option<(&str, Option<u64>, &str)>, Option<&str>, &str) {
        let key = self.issue_key.as_deref().map(|key| match key.rsplit_once('-') {
            Some((project, number)) => (project, number.parse().ok(), key),
            None => (key, None, key),
        });
        (key, self.assignee.as_deref(), &self.message)
    }
}

/// Everything a rule may read: the snapshot and the views derived from it.
pub struct AuditContext<'a> {
    pub snapshot: &'a Snapshot,
    pub clock: TemporalClassifier<'a>,
    pub workload: Workload<'a>,
    pub links: LinkGraph<'a>,
    pub thresholds: &'a Thresholds,
}

impl<'a> AuditContext<'a> {
    pub fn new(snapshot: &'a Snapshot, thresholds: &'a Thresholds) -> Self {
        let clock = TemporalClassifier::new(snapshot.now, &snapshot.increments);
        let workload = Workload::new(project_issues(snapshot), snapshot.developers());
        let links = LinkGraph::new(snapshot.issues.iter().chain(&snapshot.related));
        Self {
            snapshot,
            clock,
            workload,
            links,
            thresholds,
        }
    }

    /// Project issues under audit: past the cutoff, not SKBs, not discarded.
    pub fn project_issues(&self) -> impl Iterator<Item = &'a Issue> {
        project_issues(self.snapshot)
    }

    pub fn skbs(&self) -> impl Iterator<Item = &'a Issue> {
        self.snapshot.audited_issues().filter(|issue| issue.is_skb())
    }
}

fn project_issues(snapshot: &Snapshot) -> impl Iterator<Item = &Issue> {
    snapshot
        .audited_issues()
        .filter(|issue| !issue.is_skb() && issue.status != Status::Discarded)
}

/// One named check in the catalog. Implementations must not depend on the
/// order rules run in.
pub trait Rule: Send + Sync {
    /// Stable identifier, the same across runs.
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Rules that need Developer-role membership are skipped without it.
    fn requires_elevated_access(&self) -> bool {
        false
    }
    fn check(&self, ctx: &AuditContext<'_>) -> Vec<Violation>;
}

/// A rule backed by a plain function.
#[derive(Clone, Copy)]
pub struct RuleFn {
    pub id: &'static str,
    pub description: &'static str,
    pub elevated: bool,
    pub check: fn(&AuditContext<'_>) -> Vec<Violation>,
}

impl Rule for RuleFn {
    fn id(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn requires_elevated_access(&self) -> bool {
        self.elevated
    }

    fn check(&self, ctx: &AuditContext<'_>) -> Vec<Violation> {
        (self.check)(ctx)
    }
}

/// The full built-in catalog.
pub fn catalog() -> Vec<Box<dyn Rule>> {
    let rules = [
        staleness::STALE_ISSUES,
        assignment::ASSIGNEE_PRESENT,
        assignment::WIP_LIMIT,
        assignment::BLOCKED_LIMIT,
        assignment::TEAM_MEMBERSHIP,
        assignment::FULL_COVERAGE,
        content::DESCRIPTION_REQUIRED,
        content::FIX_VERSION_REQUIRED,
        content::PI_CURRENCY,
        content::OUTCOME_REQUIRED,
        linkage::NO_CHILD_OF_OBJECTIVE,
        linkage::NO_RELATES_TO_FEATURE,
        linkage::PARENT_REQUIRED,
        linkage::PARENT_IN_CURRENT_PI,
        linkage::STATUS_CONSISTENCY,
        delivery::NO_COMMITS_WHILE_EARLY,
        delivery::NO_UNMERGED_MRS,
        delivery::REVIEWING_NEEDS_OPEN_MR,
        delivery::RFA_VOLUME_CAP,
        skb::SKB_AGE,
        skb::SKB_LINKED,
    ];
    rules
        .into_iter()
        .map(|rule| Box::new(rule) as Box<dyn Rule>)
        .collect()
}

/// `"K-1 ('Summary')"`, the way findings name an issue.
pub(crate) fn describe(issue: &Issue) -> String {
    if issue.summary.is_empty() {
        issue.key.clone()
    } else {
        format!("{} ('{}')", issue.key, issue.summary)
    }
}

pub(crate) fn keys<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> String {
    issues
        .into_iter()
        .map(|issue| issue.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
