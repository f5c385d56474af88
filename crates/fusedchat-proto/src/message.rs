use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{TaskDescriptor, TaskStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    pub text: String,
}

/// What a message carries: a task descriptor or plain text, never both.
///
/// Task comes first so that history records written with a placeholder
/// `parts` entry next to `task` still load as task messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Task { task: TaskDescriptor },
    Text { parts: Vec<Part> },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text {
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn task(&self) -> Option<&TaskDescriptor> {
        match self {
            MessageContent::Task { task } => Some(task),
            MessageContent::Text { .. } => None,
        }
    }
}

/// A message before it enters a session; the session stamps time and key.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub role: Role,
    pub content: MessageContent,
    pub is_error: bool,
}

impl MessageDraft {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::text(text),
            is_error: false,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: MessageContent::text(text),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::model(text)
        }
    }

    pub fn task(task: TaskDescriptor) -> Self {
        Self {
            role: Role::Model,
            content: MessageContent::Task { task },
            is_error: false,
        }
    }

    pub fn stamp(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content,
            timestamp: Utc::now(),
            key: new_key(),
            is_error: self.is_error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    #[serde(flatten)]
    pub content: MessageContent,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Locally unique rendering key; the only handle pollers use to find
    /// their message again.
    #[serde(default = "new_key")]
    pub key: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn task(&self) -> Option<&TaskDescriptor> {
        self.content.task()
    }

    pub fn task_mut(&mut self) -> Option<&mut TaskDescriptor> {
        match &mut self.content {
            MessageContent::Task { task } => Some(task),
            MessageContent::Text { .. } => None,
        }
    }

    /// The line a chat view shows for this message.
    pub fn render_text(&self) -> String {
        match &self.content {
            MessageContent::Text { parts } => parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            MessageContent::Task { task } => render_task(task),
        }
    }
}

fn render_task(task: &TaskDescriptor) -> String {
    let result = task.result.as_ref();
    match task.status {
        TaskStatus::Queued | TaskStatus::Processing => {
            format!("Generating podcast for *{}*...", task.original_name)
        }
        TaskStatus::Failed => format!(
            "Podcast generation failed: {}",
            result
                .and_then(|r| r.error.as_deref())
                .unwrap_or("Unknown error")
        ),
        TaskStatus::Complete => match result.and_then(|r| r.audio_url.as_deref()) {
            Some(url) => format!("Podcast for *{}* is ready! {}", task.original_name, url),
            None => format!("Podcast for *{}* finished without audio.", task.original_name),
        },
    }
}

pub fn new_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One conversation: its client-generated id and ordered messages. This is
/// also the shape saved to and loaded from history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            messages: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn find(&self, key: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.key == key)
    }

    /// (message key, task) for every task that has not reached a terminal
    /// state.
    pub fn pending_tasks(&self) -> Vec<(&str, &TaskDescriptor)> {
        self.messages
            .iter()
            .filter_map(|m| {
                let task = m.task()?;
                (!task.status.is_terminal()).then_some((m.key.as_str(), task))
            })
            .collect()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskResult;

    #[test]
    fn test_task_record_with_placeholder_parts_loads_as_task() {
        let json = r#"{
            "role": "model",
            "parts": [{"text": "Generating podcast for *Notes.pdf*..."}],
            "task": {"id": "abc", "type": "podcast", "status": "complete",
                     "originalName": "Notes.pdf",
                     "result": {"audioUrl": "http://ai/podcasts/n.mp3"}},
            "timestamp": "2025-06-13T15:47:25.824Z",
            "key": "k1"
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        let task = msg.task().expect("task message");
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(msg.key, "k1");
        assert_eq!(
            msg.render_text(),
            "Podcast for *Notes.pdf* is ready! http://ai/podcasts/n.mp3"
        );
    }

    #[test]
    fn test_text_record_without_key_gets_one() {
        let json = r#"{"role":"user","parts":[{"text":"hello"},{"text":"there"}]}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert!(msg.task().is_none());
        assert!(!msg.key.is_empty());
        assert_eq!(msg.render_text(), "hello there");
    }

    #[test]
    fn test_render_failed_task() {
        let mut task = TaskDescriptor::new_podcast("t", "Notes.pdf");
        task.apply_outcome(TaskStatus::Failed, Some(TaskResult::failure("Polling failed.")));
        let msg = MessageDraft::task(task).stamp();
        assert_eq!(
            msg.render_text(),
            "Podcast generation failed: Polling failed."
        );

        let mut bare = TaskDescriptor::new_podcast("t", "Notes.pdf");
        bare.apply_outcome(TaskStatus::Failed, None);
        let msg = MessageDraft::task(bare).stamp();
        assert_eq!(msg.render_text(), "Podcast generation failed: Unknown error");
    }

    #[test]
    fn test_error_flag_only_serialized_when_set() {
        let ok = serde_json::to_value(MessageDraft::model("hi").stamp()).unwrap();
        assert!(ok.get("isError").is_none());
        let err = serde_json::to_value(MessageDraft::error("nope").stamp()).unwrap();
        assert_eq!(err["isError"], true);
    }

    #[test]
    fn test_pending_tasks_skips_terminal() {
        let mut session = ChatSession::new();
        session.messages.push(MessageDraft::user("make a podcast").stamp());
        session
            .messages
            .push(MessageDraft::task(TaskDescriptor::new_podcast("live", "a.pdf")).stamp());
        let mut done = TaskDescriptor::new_podcast("done", "b.pdf");
        done.apply_outcome(TaskStatus::Complete, None);
        session.messages.push(MessageDraft::task(done).stamp());

        let pending = session.pending_tasks();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1.id, "live");
    }
}
