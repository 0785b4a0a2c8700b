//! The development-panel custom field. Jira renders it as a Java-style
//! `toString`, e.g. `{summaryBean=...,devSummaryJson={"cachedValue":...}}`,
//! so the JSON is cut out of the text before parsing.

use serde::Deserialize;

const MARKER: &str = "devSummaryJson=";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DevSummary {
    pub commits: u64,
    pub open_merge_requests: u64,
    pub merged_merge_requests: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    cached_value: Cached,
}

#[derive(Deserialize)]
struct Cached {
    summary: Summary,
}

#[derive(Deserialize)]
struct Summary {
    repository: Option<Section<RepositoryOverall>>,
    pullrequest: Option<Section<PullRequestOverall>>,
}

#[derive(Deserialize)]
struct Section<T> {
    overall: T,
}

#[derive(Deserialize)]
struct RepositoryOverall {
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct PullRequestOverall {
    #[serde(default)]
    details: PullRequestDetails,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PullRequestDetails {
    #[serde(default)]
    open_count: u64,
    #[serde(default)]
    merged_count: u64,
}

/// Parse the raw field value. `None` when the marker is missing or the
/// embedded JSON does not have the expected shape.
pub fn parse(raw: &str) -> Option<DevSummary> {
    let start = raw.find(MARKER)? + MARKER.len();
    let body = raw[start..].strip_suffix('}')?;
    let envelope: Envelope = serde_json::from_str(body).ok()?;
    let summary = envelope.cached_value.summary;

    let details = summary
        .pullrequest
        .map(|pr| pr.overall.details)
        .unwrap_or_default();
    Some(DevSummary {
        commits: summary.repository.map_or(0, |r| r.overall.count),
        open_merge_requests: details.open_count,
        merged_merge_requests: details.merged_count,
    })
}
