use super::{describe, AuditContext, RuleFn, Thresholds, Violation};
use crate::model::issue::{Issue, IssueType, Status};

pub const STALE_ISSUES: RuleFn = RuleFn {
    id: "stale-issues",
    description: "Issues are updated reasonably recently for their status",
    elevated: false,
    check: stale_issues,
};

/// Age limit in days for an issue, or `None` if its status is not aged.
fn age_limit(issue: &Issue, thresholds: &Thresholds) -> Option<u32> {
    let exempt_epic = issue.issue_type == IssueType::Epic && !thresholds.age_in_flight_epics;
    match issue.status {
        Status::Backlog => Some(thresholds.backlog_max_age_days),
        Status::ToDo if !exempt_epic => Some(thresholds.todo_max_age_days),
        Status::InProgress if !exempt_epic => Some(thresholds.active_max_age_days),
        Status::Reviewing | Status::MergeRequest | Status::Blocked => {
            Some(thresholds.active_max_age_days)
        }
        Status::ReadyForAcceptance => Some(thresholds.rfa_max_age_days),
        _ => None,
    }
}

fn stale_issues(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter_map(|issue| {
            let limit = age_limit(issue, ctx.thresholds)?;
            if !ctx.clock.older_than(issue, limit) {
                return None;
            }
            Some(Violation::issue(
                issue,
                format!(
                    "{}, assigned to {}, has been {} for {} days (limit {limit}).",
                    describe(issue),
                    issue.owner(),
                    issue.status,
                    ctx.clock.age(issue).num_days(),
                ),
            ))
        })
        .collect()
}
