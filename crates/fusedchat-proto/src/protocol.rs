//! JSON bodies exchanged between the chat client and the gateway.

use serde::{Deserialize, Serialize};

/// `POST /api/podcast/generate` request. Fields are optional on the wire so
/// the gateway can answer a missing one with its own validation message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub server_filename: Option<String>,
    #[serde(default)]
    pub document_name: Option<String>,
}

impl GenerateRequest {
    pub fn new(server_filename: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self {
            server_filename: Some(server_filename.into()),
            document_name: Some(document_name.into()),
        }
    }
}

/// Successful start response relayed from the AI service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartedTask {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Every gateway error is rendered as `{"message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `GET {service}/health` body; only `status` is inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
