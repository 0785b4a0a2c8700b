use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

use super::Provider;
use crate::model::snapshot::Snapshot;

/// Replays a snapshot saved as JSON. The file's own reference instant is
/// kept so a saved run audits the same way every time.
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Provider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_snapshot(&self, _now: DateTime<Utc>) -> Result<Snapshot> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot from {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse snapshot {}", self.path.display()))?;
        info!(
            path = %self.path.display(),
            issues = snapshot.issues.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }
}
