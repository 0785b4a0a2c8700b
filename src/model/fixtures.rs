//! Snapshot builders shared by the unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeSet;

use super::increment::PlanningIncrement;
use super::issue::{Issue, IssueType, Link, LinkKind, Status, TargetKind};
use super::snapshot::Snapshot;
use super::user::{User, DEVELOPER_ROLE};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

pub fn at_days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

/// PI9 is past, PI10 contains `now`, PI11 is in the future.
pub fn increments() -> Vec<PlanningIncrement> {
    let pi = |name: &str, start: i64, end: i64| PlanningIncrement {
        name: name.into(),
        start: now() + Duration::days(start),
        end: now() + Duration::days(end),
    };
    vec![
        pi("PI9", -120, -30),
        pi("PI10", -30, 61),
        pi("PI11", 61, 152),
    ]
}

/// An issue that passes every rule for its status: assigned, described,
/// scheduled into the current PI and linked to an external feature.
pub fn issue(key: &str, status: Status) -> Issue {
    Issue {
        key: key.into(),
        status,
        issue_type: IssueType::Standard,
        assignee: Some("ann".into()),
        creator: Some("ann".into()),
        summary: format!("Summary of {key}"),
        created_at: at_days_ago(10),
        updated_at: at_days_ago(1),
        description: Some("Something worth doing".into()),
        labels: BTreeSet::new(),
        fix_versions: BTreeSet::from(["PI10".to_string()]),
        links: vec![link(LinkKind::ChildOf, "SP-1", TargetKind::Feature)],
        has_commits: false,
        merge_requests: Vec::new(),
        outcome: Some("Accepted by the PO".into()),
    }
}

pub fn link(kind: LinkKind, target: &str, target_kind: TargetKind) -> Link {
    Link {
        kind,
        target_key: target.into(),
        target_kind,
    }
}

pub fn developer(id: &str) -> User {
    User::new(id, id).with_role(DEVELOPER_ROLE)
}

pub fn snapshot(issues: Vec<Issue>) -> Snapshot {
    Snapshot {
        project: "K".into(),
        now: now(),
        issues,
        related: Vec::new(),
        users: Vec::new(),
        increments: increments(),
        has_elevated_access: false,
        start_date_cutoff: None,
    }
}

/// A snapshot with elevated access whose team is the given developers.
pub fn team_snapshot(issues: Vec<Issue>, team: &[&str]) -> Snapshot {
    let mut snap = snapshot(issues);
    snap.has_elevated_access = true;
    snap.users = team.iter().map(|id| developer(id)).collect();
    snap
}
