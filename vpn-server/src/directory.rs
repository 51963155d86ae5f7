//! Config-file-backed user directory (spec §6, §4.D).
//!
//! Production deployments can swap in a database-backed [`UserDirectory`]
//! without touching the engine; this one reads a static list of accounts
//! out of the server's TOML config, matching the original deployment's
//! flat-file user store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use vpn_core::error::Result as CoreResult;
use vpn_core::plugins::{UserDirectory, UserRecord};

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password_hash: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_sessions() -> u32 {
    vpn_core::constants::DEFAULT_MAX_SESSIONS
}

fn default_enabled() -> bool {
    true
}

pub struct ConfigUserDirectory {
    users: HashMap<String, UserRecord>,
}

impl ConfigUserDirectory {
    pub fn from_entries(entries: Vec<UserEntry>) -> Self {
        let users = entries
            .into_iter()
            .map(|e| {
                (
                    e.username.clone(),
                    UserRecord {
                        user_id: e.username,
                        password_hash: e.password_hash,
                        max_sessions: e.max_sessions,
                        enabled: e.enabled,
                    },
                )
            })
            .collect();
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for ConfigUserDirectory {
    async fn find(&self, username: &str) -> CoreResult<Option<UserRecord>> {
        Ok(self.users.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_known_user_and_misses_unknown() {
        let dir = ConfigUserDirectory::from_entries(vec![UserEntry {
            username: "alice".into(),
            password_hash: "hash".into(),
            max_sessions: 3,
            enabled: true,
        }]);
        assert!(dir.find("alice").await.unwrap().is_some());
        assert!(dir.find("bob").await.unwrap().is_none());
    }
}
