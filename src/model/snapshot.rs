use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::increment::PlanningIncrement;
use super::issue::Issue;
use super::user::User;

/// Reasons a snapshot cannot be audited. Any of these aborts evaluation
/// before a single rule runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has no project key")]
    MissingProject,

    #[error("snapshot has no planning increments")]
    NoIncrements,

    #[error("planning increment '{0}' ends before it starts")]
    InvertedIncrement(String),

    #[error("planning increments '{earlier}' and '{later}' are out of order or overlap")]
    UnorderedIncrements { earlier: String, later: String },

    #[error("no planning increment contains the reference instant {0}")]
    NoCurrentIncrement(DateTime<Utc>),

    #[error("issue key '{0}' appears more than once")]
    DuplicateIssue(String),
}

/// A point-in-time, read-only view of one tracker project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub project: String,
    pub now: DateTime<Utc>,
    /// Issues under audit.
    pub issues: Vec<Issue>,
    /// Records fetched only so links resolve (features, objectives, epics
    /// in other projects). Never audited themselves.
    #[serde(default)]
    pub related: Vec<Issue>,
    #[serde(default)]
    pub users: Vec<User>,
    /// Ordered, non-overlapping planning calendar.
    pub increments: Vec<PlanningIncrement>,
    /// True when Developer-role membership could be read.
    #[serde(default)]
    pub has_elevated_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_cutoff: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.project.trim().is_empty() {
            return Err(SnapshotError::MissingProject);
        }
        if self.increments.is_empty() {
            return Err(SnapshotError::NoIncrements);
        }
        for pi in &self.increments {
            if pi.end <= pi.start {
                return Err(SnapshotError::InvertedIncrement(pi.name.clone()));
            }
        }
        for pair in self.increments.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(SnapshotError::UnorderedIncrements {
                    earlier: pair[0].name.clone(),
                    later: pair[1].name.clone(),
                });
            }
        }
        if !self.increments.iter().any(|pi| pi.contains(self.now)) {
            return Err(SnapshotError::NoCurrentIncrement(self.now));
        }

        let mut seen = HashSet::new();
        for issue in self.issues.iter().chain(&self.related) {
            if !seen.insert(issue.key.as_str()) {
                return Err(SnapshotError::DuplicateIssue(issue.key.clone()));
            }
        }
        Ok(())
    }

    /// Issues in scope for this run: everything created at or after the cutoff.
    pub fn audited_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| {
            self.start_date_cutoff
                .map_or(true, |cutoff| issue.created_at >= cutoff)
        })
    }

    pub fn developers(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| u.is_developer())
    }
}
