use super::{describe, keys, AuditContext, RuleFn, Violation};
use crate::model::issue::{Issue, Status};

pub const NO_COMMITS_WHILE_EARLY: RuleFn = RuleFn {
    id: "no-commits-while-early",
    description: "No BACKLOG or To Do issue has commits",
    elevated: false,
    check: no_commits_while_early,
};

pub const NO_UNMERGED_MRS: RuleFn = RuleFn {
    id: "no-unmerged-mrs",
    description: "No READY FOR ACCEPTANCE or Done issue has unmerged merge requests",
    elevated: false,
    check: no_unmerged_mrs,
};

pub const REVIEWING_NEEDS_OPEN_MR: RuleFn = RuleFn {
    id: "reviewing-needs-open-mr",
    description: "Reviewing and Merge Request issues have an unmerged merge request",
    elevated: false,
    check: reviewing_needs_open_mr,
};

pub const RFA_VOLUME_CAP: RuleFn = RuleFn {
    id: "rfa-volume-cap",
    description: "Not too many issues are waiting for acceptance",
    elevated: false,
    check: rfa_volume_cap,
};

fn report(issue: &Issue, problem: &str) -> Violation {
    Violation::issue(
        issue,
        format!(
            "{}, assigned to {}, is {} {problem}.",
            describe(issue),
            issue.owner(),
            issue.status
        ),
    )
}

fn no_commits_while_early(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| matches!(issue.status, Status::Backlog | Status::ToDo))
        .filter(|issue| issue.has_commits)
        .map(|issue| report(issue, "but has commits"))
        .collect()
}

fn no_unmerged_mrs(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| matches!(issue.status, Status::ReadyForAcceptance | Status::Done))
        .filter(|issue| issue.has_unmerged_merge_request())
        .map(|issue| report(issue, "with unmerged merge requests"))
        .collect()
}

/// Once everything is merged the issue belongs in READY FOR ACCEPTANCE.
fn reviewing_needs_open_mr(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter(|issue| matches!(issue.status, Status::Reviewing | Status::MergeRequest))
        .filter(|issue| !issue.has_unmerged_merge_request())
        .map(|issue| report(issue, "with no unmerged merge requests"))
        .collect()
}

fn rfa_volume_cap(ctx: &AuditContext<'_>) -> Vec<Violation> {
    let limit = ctx.thresholds.max_rfa;
    let waiting: Vec<&Issue> = ctx
        .project_issues()
        .filter(|issue| issue.status == Status::ReadyForAcceptance)
        .collect();
    if waiting.len() <= limit {
        return Vec::new();
    }
    vec![Violation::project(format!(
        "{} issues are READY FOR ACCEPTANCE (limit {limit}): {}.",
        waiting.len(),
        keys(waiting.iter().copied())
    ))]
}
