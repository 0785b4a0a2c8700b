use std::collections::HashMap;

use super::temporal::TemporalClassifier;
use crate::model::issue::{Issue, StatusCategory};

/// Labels that release an issue from needing a parent of record.
pub const UNLINKED_LABELS: [&str; 4] = ["DEPENDENCY", "TEAM_BACKLOG", "INNOVATION", "OVERHEAD"];

/// Resolves parent links against every record in the snapshot.
pub struct LinkGraph<'a> {
    records: HashMap<&'a str, &'a Issue>,
}

impl<'a> LinkGraph<'a> {
    pub fn new(records: impl IntoIterator<Item = &'a Issue>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|issue| (issue.key.as_str(), issue))
                .collect(),
        }
    }

    pub fn resolve(&self, key: &str) -> Option<&'a Issue> {
        self.records.get(key).copied()
    }

    /// Parents of record that resolve to a known issue. Dangling targets and
    /// feature/objective parents outside the snapshot are left out.
    pub fn parents(&self, issue: &Issue) -> Vec<&'a Issue> {
        issue
            .links
            .iter()
            .filter(|link| link.is_parent_link())
            .filter_map(|link| self.resolve(&link.target_key))
            .collect()
    }

    /// Whether any resolved parent is scheduled into the current increment.
    /// `None` when no parent resolves, so there is nothing to judge.
    pub fn parent_in_current(
        &self,
        issue: &Issue,
        clock: &TemporalClassifier<'_>,
    ) -> Option<bool> {
        let parents = self.parents(issue);
        if parents.is_empty() {
            return None;
        }
        Some(parents.iter().any(|p| clock.in_current(&p.fix_versions)))
    }

    /// Resolved parents whose status contradicts the child's.
    pub fn inconsistent_parents(&self, child: &Issue) -> Vec<&'a Issue> {
        self.parents(child)
            .into_iter()
            .filter(|parent| !is_consistent(child.category(), parent.category()))
            .collect()
    }
}

pub fn has_parent_link(issue: &Issue) -> bool {
    issue.links.iter().any(|link| link.is_parent_link())
}

pub fn is_exempt(issue: &Issue) -> bool {
    issue.has_label_in(&UNLINKED_LABELS)
}

/// A child may trail its parent but never lead it, and nothing may stay
/// open under a parent that is already complete.
pub fn is_consistent(child: StatusCategory, parent: StatusCategory) -> bool {
    if child > parent {
        return false;
    }
    !(parent == StatusCategory::Completed && child != StatusCategory::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{increments, issue, link, now};
    use crate::model::issue::{LinkKind, Status, TargetKind};
    use StatusCategory::*;

    #[test]
    fn ordering_table() {
        let all = [NotStarted, Active, PendingAcceptance, Completed];
        let expected = [
            // parent:   NotStarted Active  Pending Completed
            [true, true, true, false],   // child NotStarted
            [false, true, true, false],  // child Active
            [false, false, true, false], // child PendingAcceptance
            [false, false, false, true], // child Completed
        ];
        for (i, child) in all.iter().enumerate() {
            for (j, parent) in all.iter().enumerate() {
                assert_eq!(
                    is_consistent(*child, *parent),
                    expected[i][j],
                    "child {child} under parent {parent}"
                );
            }
        }
    }

    #[test]
    fn parent_link_kinds() {
        let mut item = issue("K-1", Status::ToDo);
        item.links = vec![link(LinkKind::RelatesTo, "SP-9", TargetKind::Feature)];
        assert!(!has_parent_link(&item));
        item.links.push(link(LinkKind::EpicLink, "K-100", TargetKind::Epic));
        assert!(has_parent_link(&item));
    }

    #[test]
    fn exemption_labels() {
        let mut item = issue("K-1", Status::ToDo);
        assert!(!is_exempt(&item));
        item.labels.insert("Innovation".into());
        assert!(is_exempt(&item));
    }

    #[test]
    fn dangling_parents_are_dropped() {
        let mut child = issue("K-1", Status::InProgress);
        child.links = vec![
            link(LinkKind::EpicLink, "K-100", TargetKind::Epic),
            link(LinkKind::ChildOf, "SP-404", TargetKind::Feature),
            link(LinkKind::RelatesTo, "K-200", TargetKind::Issue),
        ];
        let epic = issue("K-100", Status::InProgress);
        let other = issue("K-200", Status::Done);
        let records = vec![epic, other];
        let graph = LinkGraph::new(&records);

        let parents = graph.parents(&child);
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].key, "K-100");
    }

    #[test]
    fn parent_in_current_needs_one_current_parent() {
        let pis = increments();
        let clock = TemporalClassifier::new(now(), &pis);

        let mut child = issue("K-1", Status::InProgress);
        child.links = vec![
            link(LinkKind::EpicLink, "K-100", TargetKind::Epic),
            link(LinkKind::ChildOf, "SP-2", TargetKind::Feature),
        ];
        let mut epic = issue("K-100", Status::InProgress);
        epic.fix_versions = ["PI9".to_string()].into();
        let mut feature = issue("SP-2", Status::InProgress);
        feature.fix_versions = ["PI9".to_string(), "PI10".to_string()].into();

        let records = vec![epic.clone(), feature];
        assert_eq!(
            LinkGraph::new(&records).parent_in_current(&child, &clock),
            Some(true)
        );

        let records = vec![epic];
        assert_eq!(
            LinkGraph::new(&records).parent_in_current(&child, &clock),
            Some(false)
        );

        let records: Vec<Issue> = Vec::new();
        assert_eq!(
            LinkGraph::new(&records).parent_in_current(&child, &clock),
            None
        );
    }
}
