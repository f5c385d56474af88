//! Which provider keys a request is allowed to spend.
//!
//! Approved access requests are a privilege escalation: the caller's own
//! keys are replaced by the operator's. The decision lives behind
//! [`CredentialPolicy`] so it can be tested and audited away from the
//! request handlers.

use fusedchat_proto::config::OperatorConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::users::UserRecord;

/// Provider keys forwarded to the AI service as `api_keys`.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub gemini: Option<String>,
    pub grok: Option<String>,
}

impl Credentials {
    pub fn new(gemini: Option<String>, grok: Option<String>) -> Self {
        Self {
            gemini: usable(gemini),
            grok: usable(grok),
        }
    }

    pub fn has_gemini(&self) -> bool {
        self.gemini.is_some()
    }
}

// Keys must never end up in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini", &self.gemini.as_ref().map(|_| "<redacted>"))
            .field("grok", &self.grok.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn usable(key: Option<String>) -> Option<String> {
    key.filter(|k| !k.trim().is_empty())
}

/// Where the credentials for a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Operator,
    User,
}

pub trait CredentialPolicy: Send + Sync {
    fn resolve_credentials(&self, user: &UserRecord) -> (Credentials, CredentialSource);
}

/// Operator keys for approved access requests, the user's own otherwise.
#[derive(Debug, Clone)]
pub struct AccessRequestPolicy {
    operator: Credentials,
}

impl AccessRequestPolicy {
    pub fn new(operator: &OperatorConfig) -> Self {
        Self {
            operator: Credentials::new(
                operator.gemini_api_key.clone(),
                operator.grok_api_key.clone(),
            ),
        }
    }
}

impl CredentialPolicy for AccessRequestPolicy {
    fn resolve_credentials(&self, user: &UserRecord) -> (Credentials, CredentialSource) {
        if user.access_approved() {
            debug!("User {} has approved access; using operator keys", user.id);
            return (self.operator.clone(), CredentialSource::Operator);
        }
        (
            Credentials::new(user.gemini_api_key.clone(), user.grok_api_key.clone()),
            CredentialSource::User,
        )
    }
}
