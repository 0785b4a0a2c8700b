pub mod file;
pub mod jira;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::model::snapshot::Snapshot;

/// A source of project snapshots.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    /// Gather everything the audit needs as of `now`.
    async fn fetch_snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot>;
}


/// A saved snapshot file when one is given, otherwise the configured tracker.
pub fn create_provider(config: &AppConfig, snapshot: Option<PathBuf>) -> Result<Box<dyn Provider>> {
    if let Some(path) = snapshot {
        return Ok(Box::new(file::FileProvider::new(path)));
    }
    Ok(Box::new(jira::JiraProvider::new(
        &config.jira,
        &config.calendar,
    )?))
}
