use super::{describe, AuditContext, RuleFn, Violation};
use crate::engine::links::is_exempt;
use crate::model::issue::{Issue, StatusCategory};

pub const SKB_AGE: RuleFn = RuleFn {
    id: "skb-age",
    description: "Team SKBs are updated within their status limit",
    elevated: true,
    check: skb_age,
};

pub const SKB_LINKED: RuleFn = RuleFn {
    id: "skb-linked",
    description: "Open team SKBs trace to a feature or objective in the current PI",
    elevated: true,
    check: skb_linked,
};

/// SKBs the team owns: assigned to a developer, or unassigned and raised
/// by one.
fn team_skbs<'a>(ctx: &'a AuditContext<'a>) -> impl Iterator<Item = &'a Issue> + 'a {
    ctx.skbs().filter(move |skb| {
        let owner = skb.assignee.as_deref().or(skb.creator.as_deref());
        owner.is_some_and(|id| ctx.workload.is_member(id))
    })
}

fn skb_age(ctx: &AuditContext<'_>) -> Vec<Violation> {
    team_skbs(ctx)
        .filter_map(|skb| {
            let limit = *ctx.thresholds.skb_max_age_days.get(skb.status.name())?;
            if !ctx.clock.older_than(skb, limit) {
                return None;
            }
            Some(Violation::issue(
                skb,
                format!(
                    "{}, assigned to {}, is {} and has not been updated for {} days (limit {limit}).",
                    describe(skb),
                    skb.owner(),
                    skb.status,
                    ctx.clock.age(skb).num_days()
                ),
            ))
        })
        .collect()
}

/// Only feature (child-of) and objective (relates-to) links count; an epic
/// link does not. A parent outside the snapshot cannot be checked for its
/// PI, so an SKB with one is given the benefit of the doubt.
fn skb_linked(ctx: &AuditContext<'_>) -> Vec<Violation> {
    team_skbs(ctx)
        .filter(|skb| skb.category() != StatusCategory::Completed && !is_exempt(skb))
        .filter(|skb| {
            let mut targets = skb
                .links
                .iter()
                .filter(|link| link.is_feature_or_objective_link())
                .map(|link| ctx.links.resolve(&link.target_key))
                .peekable();
            if targets.peek().is_none() {
                return true;
            }
            let mut dangling = false;
            for target in targets {
                match target {
                    Some(parent) if ctx.clock.in_current(&parent.fix_versions) => return false,
                    Some(_) => {}
                    None => dangling = true,
                }
            }
            !dangling
        })
        .map(|skb| {
            Violation::issue(
                skb,
                format!(
                    "{}, assigned to {}, is not linked to a feature or objective in the current PI.",
                    describe(skb),
                    skb.owner()
                ),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{at_days_ago, issue, link, snapshot, team_snapshot};
    use crate::model::issue::{IssueType, LinkKind, Status, TargetKind};
    use crate::model::snapshot::Snapshot;
    use crate::rules::Thresholds;

    fn run(rule: fn(&AuditContext<'_>) -> Vec<Violation>, snap: &Snapshot) -> Vec<String> {
        let thresholds = Thresholds::default();
        rule(&AuditContext::new(snap, &thresholds))
            .into_iter()
            .filter_map(|v| v.issue_key)
            .collect()
    }

    fn skb(key: &str, status: &str, category: StatusCategory) -> Issue {
        let mut item = issue(key, Status::from_name_or(status, category));
        item.issue_type = IssueType::Skb;
        item
    }

    #[test]
    fn skb_age_uses_per_status_limits() {
        let mut verifying = skb("SKB-1", "Verifying", StatusCategory::Active);
        verifying.updated_at = at_days_ago(3);
        let mut assigned = skb("SKB-2", "Assigned", StatusCategory::NotStarted);
        assigned.updated_at = at_days_ago(10);
        let mut closed = skb("SKB-3", "Done", StatusCategory::Completed);
        closed.updated_at = at_days_ago(300);

        let snap = team_snapshot(vec![verifying, assigned, closed], &["ann"]);
        assert_eq!(run(skb_age, &snap), ["SKB-1"]);
    }

    #[test]
    fn only_team_skbs_are_aged() {
        let mut theirs = skb("SKB-1", "Identified", StatusCategory::NotStarted);
        theirs.updated_at = at_days_ago(30);
        theirs.assignee = Some("zed".into());
        let mut raised_by_us = skb("SKB-2", "Identified", StatusCategory::NotStarted);
        raised_by_us.updated_at = at_days_ago(30);
        raised_by_us.assignee = None;

        let snap = team_snapshot(vec![theirs, raised_by_us], &["ann"]);
        assert_eq!(run(skb_age, &snap), ["SKB-2"]);
    }

    #[test]
    fn project_issues_are_not_treated_as_skbs() {
        let mut stale = issue("K-1", Status::InProgress);
        stale.updated_at = at_days_ago(300);
        let snap = team_snapshot(vec![stale], &["ann"]);
        assert!(run(skb_age, &snap).is_empty());
    }

    #[test]
    fn skb_linkage_checks_the_parent_pi() {
        let mut unlinked = skb("SKB-1", "Assigned", StatusCategory::NotStarted);
        unlinked.links.clear();
        let mut old_feature = skb("SKB-2", "Assigned", StatusCategory::NotStarted);
        old_feature.links = vec![link(LinkKind::ChildOf, "SP-7", TargetKind::Feature)];
        let mut current_objective = skb("SKB-3", "Assigned", StatusCategory::NotStarted);
        current_objective.links = vec![link(LinkKind::RelatesTo, "SPO-8", TargetKind::Objective)];
        let unresolved = skb("SKB-4", "Assigned", StatusCategory::NotStarted);

        let mut feature = issue("SP-7", Status::from_name_or("Implementing", StatusCategory::Active));
        feature.fix_versions = ["PI9".to_string()].into();
        let objective = issue("SPO-8", Status::from_name_or("Identified", StatusCategory::NotStarted));

        let mut snap = team_snapshot(
            vec![unlinked, old_feature, current_objective, unresolved],
            &["ann"],
        );
        snap.related = vec![feature, objective];
        assert_eq!(run(skb_linked, &snap), ["SKB-1", "SKB-2"]);
    }

    #[test]
    fn epic_links_do_not_count_for_skbs() {
        let mut epic_only = skb("SKB-1", "Assigned", StatusCategory::NotStarted);
        epic_only.links = vec![link(LinkKind::EpicLink, "K-100", TargetKind::Epic)];
        let mut epic = issue("K-100", Status::InProgress);
        epic.issue_type = IssueType::Epic;

        let snap = team_snapshot(vec![epic_only, epic], &["ann"]);
        assert_eq!(run(skb_linked, &snap), ["SKB-1"]);
    }

    #[test]
    fn skb_rules_need_team_data() {
        let snap = snapshot(vec![skb("SKB-1", "Assigned", StatusCategory::NotStarted)]);
        // Without elevated access there is no team, so nothing is a team SKB.
        assert!(run(skb_linked, &snap).is_empty());
    }
}
