use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::Provider;
use crate::config::{CalendarConfig, JiraConfig};
use crate::model::increment::{cadence, PlanningIncrement};
use crate::model::issue::{
    Issue, IssueType, Link, LinkKind, MergeRequest, Status, StatusCategory, TargetKind,
};
use crate::model::snapshot::Snapshot;
use crate::model::user::{User, DEVELOPER_ROLE};
use crate::util::adf::description_text;
use crate::util::dev_summary;

const PAGE_SIZE: usize = 100;
/// Keys per `key in (...)` query when fetching link targets.
const KEY_BATCH: usize = 50;
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Where the tracker keeps the fields that are not built in, and how keys
/// tell features and objectives apart.
#[derive(Debug, Clone)]
pub struct FieldNames {
    pub epic_link: String,
    pub dev_summary: String,
    pub outcome: String,
    pub feature_prefix: String,
    pub objective_prefix: String,
}

impl FieldNames {
    fn from_config(config: &JiraConfig) -> Self {
        Self {
            epic_link: config.epic_link_field.clone(),
            dev_summary: config.dev_summary_field.clone(),
            outcome: config.outcome_field.clone(),
            feature_prefix: config.feature_prefix.clone(),
            objective_prefix: config.objective_prefix.clone(),
        }
    }

    fn target_kind(&self, key: &str) -> TargetKind {
        if key.starts_with(&self.objective_prefix) {
            TargetKind::Objective
        } else if key.starts_with(&self.feature_prefix) {
            TargetKind::Feature
        } else {
            TargetKind::Issue
        }
    }

    fn query_list(&self) -> String {
        [
            "summary",
            "description",
            "status",
            "issuetype",
            "assignee",
            "creator",
            "created",
            "updated",
            "labels",
            "fixVersions",
            "issuelinks",
            self.epic_link.as_str(),
            self.dev_summary.as_str(),
            self.outcome.as_str(),
        ]
        .join(",")
    }
}

pub struct JiraProvider {
    base_url: String,
    auth_header: String,
    project: String,
    skb_project: Option<String>,
    start_date: Option<NaiveDate>,
    fields: FieldNames,
    epoch: NaiveDate,
    length_days: u32,
    prefix: String,
    lookahead: u32,
    client: reqwest::Client,
}

impl JiraProvider {
    pub fn new(config: &JiraConfig, calendar: &CalendarConfig) -> Result<Self> {
        let project = config.project()?.to_string();
        let credentials = config.credentials()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: credentials.header_value(),
            skb_project: config
                .skb_project
                .clone()
                .filter(|skb| !skb.is_empty() && *skb != project),
            project,
            start_date: config.start_date,
            fields: FieldNames::from_config(config),
            epoch: calendar.epoch,
            length_days: calendar.length_days,
            prefix: calendar.prefix.clone(),
            lookahead: calendar.lookahead,
            client: reqwest::Client::new(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Jira request failed: {url}"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.get(url).await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Jira returned {status} for {url}");
        }
        resp.json().await.context("Failed to parse Jira response")
    }

    /// Run a JQL search to completion, one page at a time.
    async fn search(&self, jql: &str) -> Result<Vec<RawIssue>> {
        let mut issues = Vec::new();
        loop {
            let url = format!(
                "{}/rest/api/2/search?jql={}&startAt={}&maxResults={PAGE_SIZE}&fields={}&validateQuery=warn",
                self.base_url,
                urlencoding::encode(jql),
                issues.len(),
                self.fields.query_list()
            );
            let page: SearchResponse = self.get_json(&url).await?;
            let fetched = page.issues.len();
            issues.extend(page.issues);
            debug!(jql, fetched = issues.len(), total = page.total, "search page");
            if fetched == 0 || issues.len() >= page.total {
                break;
            }
        }
        Ok(issues)
    }

    async fn fetch_project(&self, project: &str, skb: bool) -> Result<Vec<Issue>> {
        let jql = project_jql(project, self.start_date);
        let raw = self
            .search(&jql)
            .await
            .with_context(|| format!("Failed to fetch issues of {project}"))?;
        info!(project, count = raw.len(), "fetched issues");
        raw.into_iter()
            .map(|issue| map_issue(issue, &self.fields, skb))
            .collect()
    }

    /// Link targets not already in hand, so parents resolve.
    async fn fetch_related(&self, issues: &[Issue]) -> Result<Vec<Issue>> {
        let have: HashSet<&str> = issues.iter().map(|i| i.key.as_str()).collect();
        let wanted: BTreeSet<&str> = issues
            .iter()
            .flat_map(|i| &i.links)
            .map(|l| l.target_key.as_str())
            .filter(|key| !have.contains(key))
            .collect();
        let wanted: Vec<&str> = wanted.into_iter().collect();

        let mut related = Vec::new();
        for batch in wanted.chunks(KEY_BATCH) {
            let jql = format!("key in ({})", batch.join(","));
            for raw in self.search(&jql).await? {
                related.push(map_issue(raw, &self.fields, false)?);
            }
        }
        info!(requested = wanted.len(), found = related.len(), "fetched link targets");
        Ok(related)
    }

    /// Members of the Developer role, or `None` when the role list is off
    /// limits to these credentials.
    async fn fetch_developers(&self) -> Result<Option<Vec<User>>> {
        let url = format!("{}/rest/api/2/project/{}/role", self.base_url, self.project);
        let resp = self.get(&url).await?;
        if !role_readable(resp.status(), &url)? {
            warn!(project = %self.project, "no permission to read project roles");
            return Ok(None);
        }
        let roles: HashMap<String, String> =
            resp.json().await.context("Failed to parse project roles")?;
        // Without the role there is no team to check against.
        let Some(role_url) = roles.get(DEVELOPER_ROLE) else {
            warn!(project = %self.project, role = DEVELOPER_ROLE, "project has no such role");
            return Ok(None);
        };

        let resp = self.get(role_url).await?;
        if !role_readable(resp.status(), role_url)? {
            warn!(project = %self.project, "no permission to read role members");
            return Ok(None);
        }
        let role: RoleResponse = resp.json().await.context("Failed to parse role members")?;
        Ok(Some(role.into_users()))
    }

    fn increments(&self, now: DateTime<Utc>) -> Vec<PlanningIncrement> {
        cadence(self.epoch, self.length_days, &self.prefix, now, self.lookahead)
    }
}

#[async_trait]
impl Provider for JiraProvider {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn fetch_snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        let mut issues = self.fetch_project(&self.project, false).await?;
        if let Some(skb) = &self.skb_project {
            issues.extend(self.fetch_project(skb, true).await?);
        }
        let related = self.fetch_related(&issues).await?;

        let developers = self.fetch_developers().await?;
        let has_elevated_access = developers.is_some();

        Ok(Snapshot {
            project: self.project.clone(),
            now,
            issues,
            related,
            users: developers.unwrap_or_default(),
            increments: self.increments(now),
            has_elevated_access,
            start_date_cutoff: self
                .start_date
                .map(|date| date.and_time(NaiveTime::MIN).and_utc()),
        })
    }
}

pub fn project_jql(project: &str, start_date: Option<NaiveDate>) -> String {
    match start_date {
        Some(date) => format!("project = {project} AND createdDate > {date}"),
        None => format!("project = {project}"),
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Deserialize)]
pub struct RawIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueFields {
    summary: Option<String>,
    description: Option<Value>,
    status: StatusField,
    issuetype: Option<NamedField>,
    assignee: Option<UserField>,
    creator: Option<UserField>,
    created: String,
    updated: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    fix_versions: Vec<NamedField>,
    #[serde(default)]
    issuelinks: Vec<IssueLink>,
    /// Custom fields, looked up through [`FieldNames`].
    #[serde(flatten)]
    custom: HashMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusField {
    name: String,
    status_category: Option<CategoryField>,
}

#[derive(Deserialize)]
struct CategoryField {
    key: String,
}

#[derive(Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserField {
    name: Option<String>,
    account_id: Option<String>,
}

impl UserField {
    fn id(self) -> Option<String> {
        self.name.or(self.account_id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueLink {
    #[serde(rename = "type")]
    link_type: NamedField,
    inward_issue: Option<LinkedIssue>,
    outward_issue: Option<LinkedIssue>,
}

#[derive(Deserialize)]
struct LinkedIssue {
    key: String,
}

/// Whether a role endpoint answered with data. Permission refusals mean the
/// team is unknown; any other failure is an error.
fn role_readable(status: StatusCode, url: &str) -> Result<bool> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
        status if !status.is_success() => bail!("Jira returned {status} for {url}"),
        _ => Ok(true),
    }
}

#[derive(Deserialize)]
struct RoleResponse {
    #[serde(default)]
    actors: Vec<RoleActor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleActor {
    name: String,
    display_name: Option<String>,
    #[serde(rename = "type")]
    actor_type: Option<String>,
}

impl RoleResponse {
    /// Individual members only; group actors are not expanded.
    fn into_users(self) -> Vec<User> {
        self.actors
            .into_iter()
            .filter(|a| a.actor_type.as_deref() != Some("atlassian-group-role-actor"))
            .map(|a| {
                let display = a.display_name.unwrap_or_else(|| a.name.clone());
                User::new(a.name, display).with_role(DEVELOPER_ROLE)
            })
            .collect()
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(text, DATE_FORMAT)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Unrecognised Jira timestamp '{text}'"))
}

fn map_links(fields: &IssueFields, names: &FieldNames) -> Vec<Link> {
    let mut links = Vec::new();
    if let Some(Value::String(epic)) = fields.custom.get(&names.epic_link) {
        links.push(Link {
            kind: LinkKind::EpicLink,
            target_key: epic.clone(),
            target_kind: TargetKind::Epic,
        });
    }
    for link in &fields.issuelinks {
        let (kind, target) = match link.link_type.name.as_str() {
            // Only the inward side names this issue's parent.
            "Parent/Child" => match &link.inward_issue {
                Some(parent) => (LinkKind::ChildOf, parent),
                None => continue,
            },
            "Relates" => match link.inward_issue.as_ref().or(link.outward_issue.as_ref()) {
                Some(other) => (LinkKind::RelatesTo, other),
                None => continue,
            },
            _ => continue,
        };
        links.push(Link {
            kind,
            target_key: target.key.clone(),
            target_kind: names.target_kind(&target.key),
        });
    }
    links
}

fn merge_requests(fields: &IssueFields, names: &FieldNames) -> (bool, Vec<MergeRequest>) {
    let Some(summary) = fields
        .custom
        .get(&names.dev_summary)
        .and_then(Value::as_str)
        .and_then(dev_summary::parse)
    else {
        return (false, Vec::new());
    };
    let open = std::iter::repeat(MergeRequest { merged: false })
        .take(summary.open_merge_requests as usize);
    let merged = std::iter::repeat(MergeRequest { merged: true })
        .take(summary.merged_merge_requests as usize);
    (summary.commits > 0, open.chain(merged).collect())
}

/// Translate one search result into the audit model.
pub fn map_issue(raw: RawIssue, names: &FieldNames, skb: bool) -> Result<Issue> {
    let fields = raw.fields;
    let category = fields
        .status
        .status_category
        .as_ref()
        .map_or(StatusCategory::Active, |c| StatusCategory::from_tracker_key(&c.key));
    let issue_type = if skb {
        IssueType::Skb
    } else {
        fields
            .issuetype
            .as_ref()
            .map_or(IssueType::Standard, |t| IssueType::from_tracker_name(&t.name))
    };
    let links = map_links(&fields, names);
    let (has_commits, merge_requests) = merge_requests(&fields, names);
    let outcome = fields.custom.get(&names.outcome).and_then(description_text);

    Ok(Issue {
        created_at: parse_timestamp(&fields.created)
            .with_context(|| format!("{}: bad created date", raw.key))?,
        updated_at: parse_timestamp(&fields.updated)
            .with_context(|| format!("{}: bad updated date", raw.key))?,
        key: raw.key,
        status: Status::from_name_or(&fields.status.name, category),
        issue_type,
        assignee: fields.assignee.and_then(UserField::id),
        creator: fields.creator.and_then(UserField::id),
        summary: fields.summary.unwrap_or_default(),
        description: fields.description.as_ref().and_then(description_text),
        labels: fields.labels.into_iter().collect(),
        fix_versions: fields.fix_versions.into_iter().map(|v| v.name).collect(),
        links,
        has_commits,
        merge_requests,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn names() -> FieldNames {
        FieldNames::from_config(&JiraConfig::default())
    }

    fn raw(fields: Value) -> RawIssue {
        let mut base = json!({
            "summary": "Calibrate the dish",
            "status": {"name": "In Progress", "statusCategory": {"key": "indeterminate"}},
            "issuetype": {"name": "Story"},
            "assignee": {"name": "ann", "displayName": "Ann"},
            "creator": {"name": "bob"},
            "created": "2025-03-01T09:30:00.000+0000",
            "updated": "2025-06-01T17:05:12.345+0100",
            "labels": ["OVERHEAD"],
            "fixVersions": [{"name": "PI26"}],
            "issuelinks": []
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), fields.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(json!({"key": "WOM-7", "fields": base})).unwrap()
    }

    #[test]
    fn jql_includes_the_cutoff() {
        assert_eq!(project_jql("WOM", None), "project = WOM");
        assert_eq!(
            project_jql("WOM", NaiveDate::from_ymd_opt(2024, 2, 1)),
            "project = WOM AND createdDate > 2024-02-01"
        );
    }

    #[test]
    fn maps_built_in_fields() {
        let issue = map_issue(raw(json!({})), &names(), false).unwrap();
        assert_eq!(issue.key, "WOM-7");
        assert_eq!(issue.status, Status::InProgress);
        assert_eq!(issue.issue_type, IssueType::Standard);
        assert_eq!(issue.assignee.as_deref(), Some("ann"));
        assert_eq!(issue.creator.as_deref(), Some("bob"));
        assert_eq!(issue.summary, "Calibrate the dish");
        assert_eq!(issue.description, None);
        assert!(issue.labels.contains("OVERHEAD"));
        assert!(issue.fix_versions.contains("PI26"));
        assert_eq!(issue.updated_at.to_rfc3339(), "2025-06-01T16:05:12.345+00:00");
    }

    #[test]
    fn unknown_statuses_keep_the_tracker_category() {
        let issue = map_issue(
            raw(json!({"status": {"name": "Validating", "statusCategory": {"key": "indeterminate"}}})),
            &names(),
            true,
        )
        .unwrap();
        assert_eq!(issue.issue_type, IssueType::Skb);
        assert_eq!(issue.status.name(), "Validating");
        assert_eq!(issue.category(), StatusCategory::Active);
    }

    #[test]
    fn links_are_classified_by_type_direction_and_prefix() {
        let issue = map_issue(
            raw(json!({
                "customfield_10006": "WOM-1",
                "issuelinks": [
                    {"type": {"name": "Parent/Child"}, "inwardIssue": {"key": "SP-10"}},
                    {"type": {"name": "Parent/Child"}, "outwardIssue": {"key": "WOM-9"}},
                    {"type": {"name": "Relates"}, "outwardIssue": {"key": "SPO-3"}},
                    {"type": {"name": "Blocks"}, "inwardIssue": {"key": "WOM-2"}}
                ]
            })),
            &names(),
            false,
        )
        .unwrap();
        let got: Vec<_> = issue
            .links
            .iter()
            .map(|l| (l.kind, l.target_key.as_str(), l.target_kind))
            .collect();
        assert_eq!(
            got,
            [
                (LinkKind::EpicLink, "WOM-1", TargetKind::Epic),
                (LinkKind::ChildOf, "SP-10", TargetKind::Feature),
                (LinkKind::RelatesTo, "SPO-3", TargetKind::Objective),
            ]
        );
    }

    #[test]
    fn development_field_yields_commits_and_merge_requests() {
        let dev = r#"{summaryBean=x,devSummaryJson={"cachedValue":{"summary":{"repository":{"overall":{"count":4}},"pullrequest":{"overall":{"details":{"openCount":1,"mergedCount":2}}}}}}}"#;
        let issue = map_issue(
            raw(json!({"customfield_13300": dev, "customfield_11949": "Demoed to the PO"})),
            &names(),
            false,
        )
        .unwrap();
        assert!(issue.has_commits);
        assert_eq!(issue.merge_requests.len(), 3);
        assert!(issue.has_unmerged_merge_request());
        assert_eq!(issue.outcome.as_deref(), Some("Demoed to the PO"));
    }

    #[test]
    fn bad_timestamps_are_errors() {
        let result = map_issue(raw(json!({"created": "yesterday"})), &names(), false);
        assert!(result.unwrap_err().to_string().contains("WOM-7"));
    }

    #[test]
    fn group_actors_are_not_members() {
        let role: RoleResponse = serde_json::from_value(json!({
            "actors": [
                {"name": "ann", "displayName": "Ann", "type": "atlassian-user-role-actor"},
                {"name": "devs", "displayName": "devs", "type": "atlassian-group-role-actor"}
            ]
        }))
        .unwrap();
        let users = role.into_users();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_developer());
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    /// Answer each request with the canned reply for its path, or 404.
    fn serve(listener: TcpListener, routes: Vec<(&'static str, u16, String)>) {
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or_default();
                let (status, body) = routes
                    .iter()
                    .find(|(route, _, _)| *route == path)
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((404, "{}".to_string()));
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });
    }

    fn provider(base: &str) -> JiraProvider {
        let config = JiraConfig {
            base_url: base.to_string(),
            project: Some("WOM".into()),
            api_token: Some("t0k".into()),
            ..JiraConfig::default()
        };
        JiraProvider::new(&config, &CalendarConfig::default()).unwrap()
    }

    const ROLES: &str = "/rest/api/2/project/WOM/role";
    const DEVELOPERS: &str = "/rest/api/2/project/WOM/role/10001";

    #[tokio::test]
    async fn developer_role_members_are_the_team() {
        let (listener, base) = listen().await;
        serve(
            listener,
            vec![
                (ROLES, 200, json!({"Developers": format!("{base}{DEVELOPERS}")}).to_string()),
                (
                    DEVELOPERS,
                    200,
                    json!({"actors": [{"name": "ann", "displayName": "Ann"}]}).to_string(),
                ),
            ],
        );
        let team = provider(&base).fetch_developers().await.unwrap().unwrap();
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].id, "ann");
    }

    #[tokio::test]
    async fn forbidden_roles_mean_no_access() {
        let (listener, base) = listen().await;
        serve(listener, vec![(ROLES, 403, "{}".to_string())]);
        assert!(provider(&base).fetch_developers().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_developer_role_means_no_team() {
        let (listener, base) = listen().await;
        serve(
            listener,
            vec![(ROLES, 200, json!({"Administrators": format!("{base}/role/1")}).to_string())],
        );
        assert!(provider(&base).fetch_developers().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_member_lookup_is_an_error() {
        let (listener, base) = listen().await;
        serve(
            listener,
            vec![
                (ROLES, 200, json!({"Developers": format!("{base}{DEVELOPERS}")}).to_string()),
                (DEVELOPERS, 500, "{}".to_string()),
            ],
        );
        let err = provider(&base).fetch_developers().await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains(DEVELOPERS));
    }
}
