use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Project role whose members make up the team.
pub const DEVELOPER_ROLE: &str = "Developers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn is_developer(&self) -> bool {
        self.roles.contains(DEVELOPER_ROLE)
    }
}
