use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Coarse workflow position of a status. Ordered: a later variant is
/// further along the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    NotStarted,
    Active,
    PendingAcceptance,
    Completed,
}

impl StatusCategory {
    /// Map the tracker's own status-category key onto ours.
    pub fn from_tracker_key(key: &str) -> Self {
        match key {
            "new" | "undefined" => StatusCategory::NotStarted,
            "done" => StatusCategory::Completed,
            _ => StatusCategory::Active,
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCategory::NotStarted => f.write_str("not started"),
            StatusCategory::Active => f.write_str("active"),
            StatusCategory::PendingAcceptance => f.write_str("pending acceptance"),
            StatusCategory::Completed => f.write_str("completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "StatusRepr", try_from = "StatusRepr")]
pub enum Status {
    Backlog,
    ToDo,
    InProgress,
    Reviewing,
    MergeRequest,
    Blocked,
    ReadyForAcceptance,
    Done,
    Discarded,
    /// A status outside the project workflow (SKB, feature and objective
    /// workflows), carrying the category the tracker reported for it.
    Other {
        name: String,
        category: StatusCategory,
    },
}

impl Status {
    pub const WORKFLOW: [Status; 9] = [
        Status::Backlog,
        Status::ToDo,
        Status::InProgress,
        Status::Reviewing,
        Status::MergeRequest,
        Status::Blocked,
        Status::ReadyForAcceptance,
        Status::Done,
        Status::Discarded,
    ];

    /// Parse a project-workflow status name, spelled exactly as the tracker
    /// spells it.
    pub fn from_name(name: &str) -> Option<Status> {
        Status::WORKFLOW.into_iter().find(|s| s.name() == name)
    }

    /// Parse a status name, falling back to `Other` with the given category.
    pub fn from_name_or(name: &str, category: StatusCategory) -> Status {
        Status::from_name(name).unwrap_or_else(|| Status::Other {
            name: name.to_string(),
            category,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Status::Backlog => "BACKLOG",
            Status::ToDo => "To Do",
            Status::InProgress => "In Progress",
            Status::Reviewing => "Reviewing",
            Status::MergeRequest => "Merge Request",
            Status::Blocked => "BLOCKED",
            Status::ReadyForAcceptance => "READY FOR ACCEPTANCE",
            Status::Done => "Done",
            Status::Discarded => "Discarded",
            Status::Other { name, .. } => name,
        }
    }

    pub fn category(&self) -> StatusCategory {
        match self {
            Status::Backlog | Status::ToDo => StatusCategory::NotStarted,
            Status::InProgress | Status::Reviewing | Status::MergeRequest | Status::Blocked => {
                StatusCategory::Active
            }
            Status::ReadyForAcceptance => StatusCategory::PendingAcceptance,
            Status::Done | Status::Discarded => StatusCategory::Completed,
            Status::Other { category, .. } => *category,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wire form of a status: a bare name for workflow statuses, or a name with
/// an explicit category for anything else.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Name(String),
    Categorized {
        name: String,
        category: StatusCategory,
    },
}

impl From<Status> for StatusRepr {
    fn from(status: Status) -> Self {
        match status {
            Status::Other { name, category } => StatusRepr::Categorized { name, category },
            known => StatusRepr::Name(known.name().to_string()),
        }
    }
}

impl TryFrom<StatusRepr> for Status {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, Self::Error> {
        match repr {
            StatusRepr::Name(name) => Status::from_name(&name).ok_or_else(|| {
                format!("unknown status '{name}': give a category for non-workflow statuses")
            }),
            StatusRepr::Categorized { name, category } => Ok(Status::from_name_or(&name, category)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    #[default]
    Standard,
    Epic,
    Bug,
    /// Defect report raised in the shared knowledge base.
    Skb,
}

impl IssueType {
    pub fn from_tracker_name(name: &str) -> Self {
        match name {
            "Epic" => IssueType::Epic,
            "Bug" => IssueType::Bug,
            _ => IssueType::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    ChildOf,
    RelatesTo,
    EpicLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Feature,
    Objective,
    Epic,
    Issue,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Feature => f.write_str("feature"),
            TargetKind::Objective => f.write_str("objective"),
            TargetKind::Epic => f.write_str("epic"),
            TargetKind::Issue => f.write_str("issue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    pub target_key: String,
    pub target_kind: TargetKind,
}

impl Link {
    /// Whether this link names a parent of record: child of a feature,
    /// related to an objective, or an epic link.
    pub fn is_parent_link(&self) -> bool {
        self.is_feature_or_objective_link() || self.kind == LinkKind::EpicLink
    }

    pub fn is_feature_or_objective_link(&self) -> bool {
        matches!(
            (self.kind, self.target_kind),
            (LinkKind::ChildOf, TargetKind::Feature) | (LinkKind::RelatesTo, TargetKind::Objective)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub merged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub status: Status,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default)]
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Empty and absent are distinct here, though both fail the description check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Names of the planning increments this issue is scheduled into.
    #[serde(default)]
    pub fix_versions: BTreeSet<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub has_commits: bool,
    #[serde(default)]
    pub merge_requests: Vec<MergeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl Issue {
    pub fn category(&self) -> StatusCategory {
        self.status.category()
    }

    pub fn is_skb(&self) -> bool {
        self.issue_type == IssueType::Skb
    }

    pub fn has_description(&self) -> bool {
        is_present(self.description.as_deref())
    }

    pub fn has_outcome(&self) -> bool {
        is_present(self.outcome.as_deref())
    }

    pub fn has_unmerged_merge_request(&self) -> bool {
        self.merge_requests.iter().any(|mr| !mr.merged)
    }

    /// Who to name in a finding: the assignee, else the creator.
    pub fn owner(&self) -> &str {
        self.assignee
            .as_deref()
            .or(self.creator.as_deref())
            .unwrap_or("UNASSIGNED")
    }

    pub fn has_label_in(&self, labels: &[&str]) -> bool {
        self.labels
            .iter()
            .any(|own| labels.iter().any(|l| own.eq_ignore_ascii_case(l)))
    }
}

fn is_present(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}
