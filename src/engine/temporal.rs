use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;

use crate::model::increment::{Phase, PlanningIncrement};
use crate::model::issue::Issue;

/// Answers time questions relative to the snapshot's reference instant.
pub struct TemporalClassifier<'a> {
    now: DateTime<Utc>,
    increments: &'a [PlanningIncrement],
}

impl<'a> TemporalClassifier<'a> {
    pub fn new(now: DateTime<Utc>, increments: &'a [PlanningIncrement]) -> Self {
        Self { now, increments }
    }

    /// Time since the issue was last touched.
    pub fn age(&self, issue: &Issue) -> TimeDelta {
        self.now - issue.updated_at
    }

    /// Strictly older than `days` whole days. Exactly `days` old is not stale.
    pub fn older_than(&self, issue: &Issue, days: u32) -> bool {
        self.age(issue) > TimeDelta::days(i64::from(days))
    }

    /// Phase of a named increment, or `None` for a name not in the calendar.
    pub fn classify(&self, name: &str) -> Option<Phase> {
        self.increments
            .iter()
            .find(|pi| pi.name == name)
            .map(|pi| pi.phase_at(self.now))
    }

    pub fn current(&self) -> Option<&'a PlanningIncrement> {
        self.increments.iter().find(|pi| pi.contains(self.now))
    }

    /// Unscheduled, or scheduled into at least one increment that has not
    /// ended. A single current or future version is enough even when older
    /// versions are also present.
    pub fn is_current_or_future(&self, fix_versions: &BTreeSet<String>) -> bool {
        fix_versions.is_empty()
            || fix_versions
                .iter()
                .any(|v| matches!(self.classify(v), Some(Phase::Current | Phase::Future)))
    }

    pub fn in_current(&self, fix_versions: &BTreeSet<String>) -> bool {
        fix_versions
            .iter()
            .any(|v| self.classify(v) == Some(Phase::Current))
    }
}
