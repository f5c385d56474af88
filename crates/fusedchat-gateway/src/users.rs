//! User directory: who a caller is and which provider keys they hold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Approved,
    Denied,
}

/// A user's request to use the operator's provider keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessRequest {
    pub status: AccessStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub grok_api_key: Option<String>,
    #[serde(default)]
    pub api_key_access_request: Option<AccessRequest>,
}

impl UserRecord {
    pub fn access_approved(&self) -> bool {
        matches!(
            self.api_key_access_request,
            Some(AccessRequest {
                status: AccessStatus::Approved
            })
        )
    }
}

/// Lookup seam for user records. Keys come back in usable (decrypted) form.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>>;
}

/// Directory backed by a JSON array file, read once at startup.
#[derive(Debug, Default)]
pub struct JsonUserStore {
    users: HashMap<String, UserRecord>,
}

impl JsonUserStore {
    pub fn from_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    /// Load the users file. A missing file yields an empty directory so the
    /// server still starts; every protected request then answers 401.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!("Users file {:?} not found; starting with no users", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let users: Vec<UserRecord> = serde_json::from_str(&content)?;
        info!("Loaded {} users from {:?}", users.len(), path);
        Ok(Self::from_users(users))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for JsonUserStore {
    async fn find_user(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.get(user_id).cloned())
    }
}
