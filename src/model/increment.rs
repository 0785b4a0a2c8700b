use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a planning increment relative to the reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Past,
    Current,
    Future,
}

/// A planning increment covering the half-open range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningIncrement {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PlanningIncrement {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        if self.end <= now {
            Phase::Past
        } else if self.start <= now {
            Phase::Current
        } else {
            Phase::Future
        }
    }
}

/// Build a fixed-cadence calendar: increments of `length_days` starting at
/// `epoch`, named `<prefix><n>`, from the first one through `lookahead`
/// increments past the one containing `now`.
///
/// Returns an empty calendar when `now` precedes the epoch or the length is zero.
pub fn cadence(
    epoch: NaiveDate,
    length_days: u32,
    prefix: &str,
    now: DateTime<Utc>,
    lookahead: u32,
) -> Vec<PlanningIncrement> {
    if length_days == 0 {
        return Vec::new();
    }
    let elapsed = (now.date_naive() - epoch).num_days();
    if elapsed < 0 {
        return Vec::new();
    }
    let current = elapsed as u64 / u64::from(length_days);
    let last = current + u64::from(lookahead);

    let midnight = |date: NaiveDate| date.and_time(NaiveTime::MIN).and_utc();
    (0..=last)
        .filter_map(|n| {
            let start = epoch.checked_add_days(Days::new(n * u64::from(length_days)))?;
            let end = start.checked_add_days(Days::new(u64::from(length_days)))?;
            Some(PlanningIncrement {
                name: format!("{prefix}{n}"),
                start: midnight(start),
                end: midnight(end),
            })
        })
        .collect()
}
