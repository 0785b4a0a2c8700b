use anyhow::{bail, Context, Result};
use base64::Engine;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::rules::Thresholds;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub jira: JiraConfig,
    pub calendar: CalendarConfig,
    pub thresholds: Thresholds,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub base_url: String,
    pub project: Option<String>,
    /// Bearer token. Preferred over username and password.
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Only issues created after this date are audited.
    pub start_date: Option<NaiveDate>,
    pub skb_project: Option<String>,
    pub feature_prefix: String,
    pub objective_prefix: String,
    pub epic_link_field: String,
    pub dev_summary_field: String,
    pub outcome_field: String,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jira.skatelescope.org".into(),
            project: None,
            api_token: None,
            username: None,
            password: None,
            start_date: None,
            skb_project: Some("SKB".into()),
            feature_prefix: "SP-".into(),
            objective_prefix: "SPO-".into(),
            epic_link_field: "customfield_10006".into(),
            dev_summary_field: "customfield_13300".into(),
            outcome_field: "customfield_11949".into(),
        }
    }
}

/// The planning calendar: fixed-length increments counted from an epoch.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub epoch: NaiveDate,
    pub length_days: u32,
    pub prefix: String,
    /// How many increments past the current one to include.
    pub lookahead: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            epoch: NaiveDate::from_ymd_opt(2018, 9, 19).unwrap_or_default(),
            length_days: 91,
            prefix: "PI".into(),
            lookahead: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Credentials {
    pub fn header_value(&self) -> String {
        match self {
            Credentials::Bearer(token) => format!("Bearer {token}"),
            Credentials::Basic { username, password } => {
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
        }
    }
}

impl JiraConfig {
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = self.api_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Bearer(token.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Credentials::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => bail!(
                "Jira credentials not supplied: set JIRA_API_TOKEN, or both JIRA_USERNAME and JIRA_PASSWORD"
            ),
        }
    }

    pub fn project(&self) -> Result<&str> {
        match self.project.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("No project to audit: pass --project or set JIRA_PROJECT"),
        }
    }
}

impl AppConfig {
    /// Overlay `JIRA_*` variables, read through `lookup` so tests need not
    /// touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("JIRA_URL") {
            self.jira.base_url = url;
        }
        if let Some(project) = lookup("JIRA_PROJECT") {
            self.jira.project = Some(project);
        }
        if let Some(token) = lookup("JIRA_API_TOKEN") {
            self.jira.api_token = Some(token);
        }
        if let Some(username) = lookup("JIRA_USERNAME") {
            self.jira.username = Some(username);
        }
        if let Some(password) = lookup("JIRA_PASSWORD") {
            self.jira.password = Some(password);
        }
        if let Some(date) = lookup("JIRA_START_DATE").filter(|d| !d.is_empty()) {
            self.jira.start_date = Some(
                parse_date(&date).with_context(|| format!("Invalid JIRA_START_DATE '{date}'"))?,
            );
        }
        Ok(())
    }
}

pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Expected a date as YYYY-MM-DD, got '{text}'"))
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tracker-tidy")
        .join("config.toml")
}

/// Load the config file at `path`, or at the default location. A missing
/// file at the default location yields the defaults; a missing file that
/// was asked for by name is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(AppConfig::default());
            }
            path
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}
