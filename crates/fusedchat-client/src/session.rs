//! The active chat session and its saved history.
//!
//! `SessionStore` is the one place message state lives. Both the user's own
//! actions and pollers write to it, always by replacing a message matched on
//! its key.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fusedchat_proto::message::{new_key, ChatMessage, ChatSession, MessageDraft};
use fusedchat_proto::task::{TaskResult, TaskStatus};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct SessionStore {
    session: RwLock<ChatSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            session: RwLock::new(ChatSession::new()),
        }
    }

    pub async fn session_id(&self) -> String {
        self.session.read().await.session_id.clone()
    }

    pub async fn snapshot(&self) -> ChatSession {
        self.session.read().await.clone()
    }

    pub async fn message(&self, key: &str) -> Option<ChatMessage> {
        self.session.read().await.find(key).cloned()
    }

    /// Append a message, stamping its timestamp and a fresh key. Returns the key.
    pub async fn add_message(&self, draft: MessageDraft) -> String {
        let message = draft.stamp();
        let key = message.key.clone();
        self.session.write().await.messages.push(message);
        key
    }

    pub async fn remove(&self, key: &str) -> Option<ChatMessage> {
        let mut session = self.session.write().await;
        let idx = session.messages.iter().position(|m| m.key == key)?;
        Some(session.messages.remove(idx))
    }

    /// Write a task's final state into its message. Does nothing if the
    /// message is gone, is not a task, or is already terminal.
    pub async fn complete_task(
        &self,
        key: &str,
        status: TaskStatus,
        result: Option<TaskResult>,
    ) -> bool {
        let mut session = self.session.write().await;
        let Some(task) = session
            .messages
            .iter_mut()
            .find(|m| m.key == key)
            .and_then(|m| m.task_mut())
        else {
            debug!("No task message {} to update", key);
            return false;
        };
        task.apply_outcome(status, result)
    }

    /// Start a fresh session. Returns the new session id.
    pub async fn reset(&self) -> String {
        let mut session = self.session.write().await;
        *session = ChatSession::new();
        session.session_id.clone()
    }

    /// Replace the current session with a saved one. Messages get fresh keys
    /// so nothing keyed on the previous session can reach them.
    pub async fn load(&self, mut saved: ChatSession) {
        for message in &mut saved.messages {
            message.key = new_key();
        }
        *self.session.write().await = saved;
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary row for `history list`.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub session_id: String,
    pub message_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Saved sessions, one JSON file per session id.
#[derive(Debug, Clone)]
pub struct HistoryArchive {
    dir: PathBuf,
}

impl HistoryArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> anyhow::Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            anyhow::bail!("Invalid session id {:?}", session_id);
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    /// Persist a session. Empty sessions are not written.
    pub async fn save(&self, session: &ChatSession) -> anyhow::Result<Option<PathBuf>> {
        if session.is_empty() {
            return Ok(None);
        }
        let path = self.path_for(&session.session_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&path, json).await?;
        info!(
            "Saved session {} ({} messages)",
            session.session_id,
            session.messages.len()
        );
        Ok(Some(path))
    }

    pub async fn load(&self, session_id: &str) -> anyhow::Result<ChatSession> {
        let path = self.path_for(session_id)?;
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saved sessions, most recent activity first.
    pub async fn list(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        if !self.dir.exists() {
            return Ok(entries);
        }

        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let session: ChatSession = match tokio::fs::read_to_string(&path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|c| serde_json::from_str(&c).map_err(anyhow::Error::from))
            {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping unreadable history file {:?}: {}", path, e);
                    continue;
                }
            };
            entries.push(HistoryEntry {
                last_activity: session.messages.iter().map(|m| m.timestamp).max(),
                message_count: session.messages.len(),
                session_id: session.session_id,
            });
        }

        entries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusedchat_proto::task::TaskDescriptor;

    #[tokio::test]
    async fn test_add_stamps_unique_keys() {
        let store = SessionStore::new();
        let a = store.add_message(MessageDraft::user("one")).await;
        let b = store.add_message(MessageDraft::user("two")).await;
        assert_ne!(a, b);
        assert_eq!(store.snapshot().await.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_complete_task_replaces_by_key() {
        let store = SessionStore::new();
        let text = store.add_message(MessageDraft::user("hi")).await;
        let key = store
            .add_message(MessageDraft::task(TaskDescriptor::new_podcast("t1", "a.pdf")))
            .await;

        assert!(!store.complete_task(&text, TaskStatus::Complete, None).await);
        assert!(!store.complete_task("missing", TaskStatus::Complete, None).await);

        let result = TaskResult {
            audio_url: Some("http://ai/podcasts/a.mp3".into()),
            error: None,
        };
        assert!(
            store
                .complete_task(&key, TaskStatus::Complete, Some(result.clone()))
                .await
        );
        // Terminal now; a late write must not change it.
        assert!(
            !store
                .complete_task(&key, TaskStatus::Failed, Some(TaskResult::failure("late")))
                .await
        );

        let message = store.message(&key).await.unwrap();
        let task = message.task().unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.result.as_ref(), Some(&result));
    }

    #[tokio::test]
    async fn test_reset_and_load() {
        let store = SessionStore::new();
        let first_id = store.session_id().await;
        let old_key = store.add_message(MessageDraft::user("hi")).await;
        let saved = store.snapshot().await;

        let new_id = store.reset().await;
        assert_ne!(first_id, new_id);
        assert!(store.snapshot().await.is_empty());

        store.load(saved).await;
        assert_eq!(store.session_id().await, first_id);
        let loaded = store.snapshot().await;
        assert_eq!(loaded.messages.len(), 1);
        assert_ne!(loaded.messages[0].key, old_key);
    }

    #[tokio::test]
    async fn test_archive_round_trip_keeps_terminal_task() {
        let dir = tempfile::tempdir().unwrap();
        let archive = HistoryArchive::new(dir.path());

        let store = SessionStore::new();
        let key = store
            .add_message(MessageDraft::task(TaskDescriptor::new_podcast("t1", "a.pdf")))
            .await;
        store
            .complete_task(&key, TaskStatus::Failed, Some(TaskResult::failure("Polling failed.")))
            .await;
        let session = store.snapshot().await;

        archive.save(&session).await.unwrap().unwrap();
        let reloaded = archive.load(&session.session_id).await.unwrap();

        assert_eq!(reloaded, session);
        assert!(reloaded.pending_tasks().is_empty());
    }

    #[tokio::test]
    async fn test_archive_skips_empty_and_lists_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let archive = HistoryArchive::new(dir.path().join("history"));

        assert!(archive.save(&ChatSession::new()).await.unwrap().is_none());
        assert!(archive.list().await.unwrap().is_empty());

        let mut older = ChatSession::new();
        let mut msg = MessageDraft::user("old").stamp();
        msg.timestamp = Utc::now() - chrono::Duration::hours(1);
        older.messages.push(msg);
        let mut newer = ChatSession::new();
        newer.messages.push(MessageDraft::user("new").stamp());

        archive.save(&older).await.unwrap();
        archive.save(&newer).await.unwrap();
        std::fs::write(archive.dir().join("junk.json"), "not json").unwrap();

        let listed = archive.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, newer.session_id);
        assert_eq!(listed[1].session_id, older.session_id);
    }

    #[tokio::test]
    async fn test_archive_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let archive = HistoryArchive::new(dir.path());
        assert!(archive.load("../etc/passwd").await.is_err());
    }
}
