use std::collections::BTreeMap;

use crate::model::issue::{Issue, Status};
use crate::model::user::User;

/// Per-assignee counts and team membership for one snapshot.
pub struct Workload<'a> {
    in_progress: BTreeMap<&'a str, Vec<&'a Issue>>,
    blocked: BTreeMap<&'a str, Vec<&'a Issue>>,
    team: BTreeMap<&'a str, &'a User>,
}

impl<'a> Workload<'a> {
    pub fn new(
        issues: impl IntoIterator<Item = &'a Issue>,
        users: impl IntoIterator<Item = &'a User>,
    ) -> Self {
        let mut in_progress: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
        let mut blocked: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
        for issue in issues {
            let Some(assignee) = issue.assignee.as_deref() else {
                continue;
            };
            match issue.status {
                Status::InProgress => in_progress.entry(assignee).or_default().push(issue),
                Status::Blocked => blocked.entry(assignee).or_default().push(issue),
                _ => {}
            }
        }

        let team = users
            .into_iter()
            .filter(|u| u.is_developer())
            .map(|u| (u.id.as_str(), u))
            .collect();

        Self {
            in_progress,
            blocked,
            team,
        }
    }

    /// Assignees holding more than `limit` In Progress issues, with those issues.
    pub fn over_wip(&self, limit: usize) -> Vec<(&'a str, &[&'a Issue])> {
        over(&self.in_progress, limit)
    }

    /// Assignees holding more than `limit` BLOCKED issues, with those issues.
    pub fn over_blocked(&self, limit: usize) -> Vec<(&'a str, &[&'a Issue])> {
        over(&self.blocked, limit)
    }

    pub fn in_progress_count(&self, assignee: &str) -> usize {
        self.in_progress.get(assignee).map_or(0, Vec::len)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.team.contains_key(user_id)
    }

    /// Developers with nothing In Progress.
    pub fn idle_developers(&self) -> impl Iterator<Item = &'a User> + '_ {
        self.team
            .iter()
            .filter(|(id, _)| self.in_progress_count(id) == 0)
            .map(|(_, dev)| *dev)
    }
}

fn over<'a, 'b>(
    groups: &'b BTreeMap<&'a str, Vec<&'a Issue>>,
    limit: usize,
) -> Vec<(&'a str, &'b [&'a Issue])> {
    groups
        .iter()
        .filter(|(_, issues)| issues.len() > limit)
        .map(|(assignee, issues)| (*assignee, issues.as_slice()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{developer, issue};

    fn assigned(key: &str, status: Status, who: Option<&str>) -> Issue {
        let mut item = issue(key, status);
        item.assignee = who.map(String::from);
        item
    }

    #[test]
    fn groups_by_assignee_and_status() {
        let issues = vec![
            assigned("K-1", Status::InProgress, Some("ann")),
            assigned("K-2", Status::InProgress, Some("ann")),
            assigned("K-3", Status::InProgress, Some("bob")),
            assigned("K-4", Status::Blocked, Some("bob")),
            assigned("K-5", Status::InProgress, None),
            assigned("K-6", Status::Reviewing, Some("ann")),
        ];
        let users: Vec<User> = Vec::new();
        let work = Workload::new(&issues, &users);
        assert_eq!(work.in_progress_count("ann"), 2);
        assert_eq!(work.in_progress_count("bob"), 1);
        assert_eq!(work.in_progress_count("cat"), 0);
        assert_eq!(work.over_wip(1).len(), 1);
        assert!(work.over_blocked(1).is_empty());
        assert_eq!(work.over_blocked(0)[0].0, "bob");
    }

    #[test]
    fn idle_developers_are_team_members_without_wip() {
        let issues = vec![assigned("K-1", Status::InProgress, Some("ann"))];
        let users = vec![
            developer("ann"),
            developer("bob"),
            User::new("po", "Product Owner"),
        ];
        let work = Workload::new(&issues, &users);
        assert!(work.is_member("ann"));
        assert!(!work.is_member("po"));
        let idle: Vec<_> = work.idle_developers().map(|u| u.id.as_str()).collect();
        assert_eq!(idle, ["bob"]);
    }
}
