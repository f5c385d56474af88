use serde::{Deserialize, Serialize};

/// Lifecycle of an externally executed job.
///
/// Transitions:
///   Queued -> Processing -> Complete | Failed
///
/// Complete and Failed are terminal; nothing moves a task out of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The AI service reports freshly created jobs as `pending`.
    #[serde(alias = "pending")]
    Queued,
    #[default]
    Processing,
    Complete,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Complete => "complete",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Podcast,
}

/// Outcome payload attached once a task finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            audio_url: None,
            error: Some(message.into()),
        }
    }
}

/// Metadata tracking one asynchronous job by its opaque id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl TaskDescriptor {
    pub fn new_podcast(id: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TaskKind::Podcast,
            status: TaskStatus::Processing,
            original_name: original_name.into(),
            result: None,
        }
    }

    /// Record a status transition. Returns false (and changes nothing) once
    /// the descriptor is already terminal.
    pub fn apply_outcome(&mut self, status: TaskStatus, result: Option<TaskResult>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        if result.is_some() {
            self.result = result;
        }
        true
    }
}

/// Body returned by `GET /podcast_status/{id}`, relayed unchanged by the
/// gateway. Extra upstream fields (e.g. `filename`) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn into_result(self) -> TaskResult {
        TaskResult {
            audio_url: self.audio_url,
            error: self.error,
        }
    }
}
