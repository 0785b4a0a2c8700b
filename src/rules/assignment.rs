use super::{describe, keys, AuditContext, RuleFn, Violation};
use crate::model::issue::{Status, StatusCategory};

pub const ASSIGNEE_PRESENT: RuleFn = RuleFn {
    id: "assignee-present",
    description: "Started issues have an assignee",
    elevated: false,
    check: assignee_present,
};

pub const WIP_LIMIT: RuleFn = RuleFn {
    id: "wip-limit",
    description: "No-one has too many issues In Progress",
    elevated: false,
    check: wip_limit,
};

pub const BLOCKED_LIMIT: RuleFn = RuleFn {
    id: "blocked-limit",
    description: "No-one has too many issues BLOCKED",
    elevated: false,
    check: blocked_limit,
};

pub const TEAM_MEMBERSHIP: RuleFn = RuleFn {
    id: "team-membership",
    description: "Open issues are assigned within the team",
    elevated: true,
    check: team_membership,
};

pub const FULL_COVERAGE: RuleFn = RuleFn {
    id: "full-coverage",
    description: "Every developer has an issue In Progress",
    elevated: true,
    check: full_coverage,
};

fn assignee_present(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| issue.category() != StatusCategory::NotStarted)
        .filter(|issue| issue.assignee.is_none())
        .map(|issue| {
            Violation::issue(
                issue,
                format!("{} is {} and unassigned.", describe(issue), issue.status),
            )
        })
        .collect()
}

fn wip_limit(ctx: &AuditContext<'_>) -> Vec<Violation> {
    let limit = ctx.thresholds.max_wip;
    ctx.workload
        .over_wip(limit)
        .into_iter()
        .map(|(assignee, issues)| {
            Violation::assignee(
                assignee,
                format!(
                    "{assignee} has {} issues In Progress (limit {limit}): {}.",
                    issues.len(),
                    keys(issues.iter().copied())
                ),
            )
        })
        .collect()
}

fn blocked_limit(ctx: &AuditContext<'_>) -> Vec<Violation> {
    let limit = ctx.thresholds.max_blocked;
    ctx.workload
        .over_blocked(limit)
        .into_iter()
        .map(|(assignee, issues)| {
            Violation::assignee(
                assignee,
                format!(
                    "{assignee} has {} issues BLOCKED (limit {limit}): {}.",
                    issues.len(),
                    keys(issues.iter().copied())
                ),
            )
        })
        .collect()
}

fn team_membership(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| issue.status != Status::Done)
        .filter_map(|issue| {
            let assignee = issue.assignee.as_deref()?;
            if ctx.workload.is_member(assignee) {
                return None;
            }
            Some(Violation::issue(
                issue,
                format!(
                    "{} is {} and assigned to {assignee}, who is not in the team.",
                    describe(issue),
                    issue.status
                ),
            ))
        })
        .collect()
}

fn full_coverage(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.workload
        .idle_developers()
        .map(|dev| {
            Violation::assignee(
                &dev.id,
                format!("{} ({}) doesn't have an issue In Progress.", dev.username, dev.id),
            )
        })
        .collect()
}
