use super::{describe, AuditContext, RuleFn, Violation};
use crate::engine::links::{has_parent_link, is_exempt};
use crate::model::issue::{Issue, LinkKind, TargetKind};

pub const NO_CHILD_OF_OBJECTIVE: RuleFn = RuleFn {
    id: "no-child-of-objective",
    description: "No issue is the child of an objective",
    elevated: false,
    check: no_child_of_objective,
};

pub const NO_RELATES_TO_FEATURE: RuleFn = RuleFn {
    id: "no-relates-to-feature",
    description: "No issue relates to a feature",
    elevated: false,
    check: no_relates_to_feature,
};

pub const PARENT_REQUIRED: RuleFn = RuleFn {
    id: "parent-required",
    description: "Issues in the current PI are linked to a feature, objective or epic",
    elevated: false,
    check: parent_required,
};

pub const PARENT_IN_CURRENT_PI: RuleFn = RuleFn {
    id: "parent-in-current-pi",
    description: "Issues in the current PI have a parent in the current PI",
    elevated: false,
    check: parent_in_current_pi,
};

pub const STATUS_CONSISTENCY: RuleFn = RuleFn {
    id: "status-consistency",
    description: "Issue status is consistent with the status of its parents",
    elevated: false,
    check: status_consistency,
};

/// Issues that link to `target_kind` with `kind`, naming the targets.
fn misdirected_links(
    ctx: &AuditContext<'_>,
    kind: LinkKind,
    target_kind: TargetKind,
    verb: &str,
) -> Vec<Violation> {
    ctx.project_issues()
        .filter_map(|issue| {
            let targets: Vec<&str> = issue
                .links
                .iter()
                .filter(|l| l.kind == kind && l.target_kind == target_kind)
                .map(|l| l.target_key.as_str())
                .collect();
            if targets.is_empty() {
                return None;
            }
            Some(Violation::issue(
                issue,
                format!(
                    "{} {verb} {target_kind} {}.",
                    describe(issue),
                    targets.join(", ")
                ),
            ))
        })
        .collect()
}

fn no_child_of_objective(ctx: &AuditContext<'_>) -> Vec<Violation> {
    misdirected_links(ctx, LinkKind::ChildOf, TargetKind::Objective, "is child of")
}

fn no_relates_to_feature(ctx: &AuditContext<'_>) -> Vec<Violation> {
    misdirected_links(ctx, LinkKind::RelatesTo, TargetKind::Feature, "relates to")
}

/// Current-PI issues that are expected to trace to a parent.
fn scheduled_now<'a>(ctx: &'a AuditContext<'a>) -> impl Iterator<Item = &'a Issue> + 'a {
    ctx.project_issues()
        .filter(move |issue| ctx.clock.in_current(&issue.fix_versions))
        .filter(|issue| !is_exempt(issue))
}

fn parent_required(ctx: &AuditContext<'_>) -> Vec<Violation> {
    scheduled_now(ctx)
        .filter(|issue| !has_parent_link(issue))
        .map(|issue| {
            Violation::issue(
                issue,
                format!("{} is {} and is not linked.", describe(issue), issue.status),
            )
        })
        .collect()
}

fn parent_in_current_pi(ctx: &AuditContext<'_>) -> Vec<Violation> {
    scheduled_now(ctx)
        .filter(|issue| ctx.links.parent_in_current(issue, &ctx.clock) == Some(false))
        .map(|issue| {
            Violation::issue(
                issue,
                format!(
                    "{} is {} and is not linked to a parent in the current PI.",
                    describe(issue),
                    issue.status
                ),
            )
        })
        .collect()
}

fn status_consistency(ctx: &AuditContext<'_>) -> Vec<Violation> {
    ctx.project_issues()
        .filter_map(|issue| {
            let parents = ctx.links.inconsistent_parents(issue);
            if parents.is_empty() {
                return None;
            }
            let named: Vec<String> = parents
                .iter()
                .map(|p| format!("{} ({})", p.key, p.status))
                .collect();
            Some(Violation::issue(
                issue,
                format!(
                    "{} is {} but has inconsistent parent/s {}.",
                    describe(issue),
                    issue.status,
                    named.join(", ")
                ),
            ))
        })
        .collect()
}
