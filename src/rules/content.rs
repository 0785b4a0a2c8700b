use super::{describe, AuditContext, RuleFn, Violation};
use crate::model::issue::{IssueType, Status};

pub const DESCRIPTION_REQUIRED: RuleFn = RuleFn {
    id: "description-required",
    description: "Issues promoted out of the BACKLOG have a description",
    elevated: false,
    check: description_required,
};

pub const FIX_VERSION_REQUIRED: RuleFn = RuleFn {
    id: "fix-version-required",
    description: "Issues promoted out of the BACKLOG are scheduled into a PI",
    elevated: false,
    check: fix_version_required,
};

pub const PI_CURRENCY: RuleFn = RuleFn {
    id: "pi-currency",
    description: "Unfinished issues are not left in past PIs",
    elevated: false,
    check: pi_currency,
};

pub const OUTCOME_REQUIRED: RuleFn = RuleFn {
    id: "outcome-required",
    description: "READY FOR ACCEPTANCE issues have outcomes",
    elevated: false,
    check: outcome_required,
};

fn description_required(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| issue.status != Status::Backlog && !issue.has_description())
        .map(|issue| {
            Violation::issue(
                issue,
                format!(
                    "{} ({}) is {} without a description.",
                    issue.key,
                    issue.creator.as_deref().unwrap_or("unknown creator"),
                    issue.status
                ),
            )
        })
        .collect()
}

fn fix_version_required(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| issue.status != Status::Backlog && issue.fix_versions.is_empty())
        .map(|issue| {
            Violation::issue(
                issue,
                format!("{} is {} and does not have a PI.", describe(issue), issue.status),
            )
        })
        .collect()
}

fn pi_currency(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| issue.status != Status::Done)
        .filter(|issue| !ctx.clock.is_current_or_future(&issue.fix_versions))
        .map(|issue| {
            let versions: Vec<&str> = issue.fix_versions.iter().map(String::as_str).collect();
            Violation::issue(
                issue,
                format!(
                    "{}, assigned to {}, is {} with old PI {}.",
                    describe(issue),
                    issue.owner(),
                    issue.status,
                    versions.join(", ")
                ),
            )
        })
        .collect()
}

/// Bugs are accepted on the fix itself and carry no outcome.
fn outcome_required(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| issue.status == Status::ReadyForAcceptance)
        .filter(|issue| issue.issue_type != IssueType::Bug && !issue.has_outcome())
        .map(|issue| {
            Violation::issue(
                issue,
                format!(
                    "{}, assigned to {}, is READY FOR ACCEPTANCE with no outcomes.",
                    describe(issue),
                    issue.owner()
                ),
            )
        })
        .collect()
}
