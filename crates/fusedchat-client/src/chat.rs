//! Chat controller: starts podcast tasks and keeps their messages current.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fusedchat_proto::message::{ChatSession, MessageDraft};
use fusedchat_proto::task::{TaskDescriptor, TaskStatus};
use tracing::{info, warn};

use crate::api::{ApiError, PodcastApi};
use crate::notice::NoticeBoard;
use crate::poller::{spawn_poller, PollOutcome, PollerSet};
use crate::session::{HistoryArchive, SessionStore};

const START_FAILED: &str = "Failed to start generation.";

pub struct ChatClient<A: PodcastApi + 'static> {
    api: Arc<A>,
    session: Arc<SessionStore>,
    pollers: PollerSet,
    archive: HistoryArchive,
    notices: Mutex<NoticeBoard>,
    poll_interval: Duration,
}

impl<A: PodcastApi + 'static> ChatClient<A> {
    pub fn new(api: Arc<A>, archive: HistoryArchive, poll_interval: Duration) -> Self {
        Self {
            api,
            session: Arc::new(SessionStore::new()),
            pollers: PollerSet::new(),
            archive,
            notices: Mutex::new(NoticeBoard::new()),
            poll_interval,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn archive(&self) -> &HistoryArchive {
        &self.archive
    }

    /// Tasks still being polled. Finished pollers are collected first.
    pub fn active_polls(&self) -> usize {
        self.reap_finished();
        self.pollers.len()
    }

    fn reap_finished(&self) {
        let finished = self.pollers.reap();
        self.announce(&finished);
    }

    fn announce(&self, outcomes: &[(String, String, PollOutcome)]) {
        if outcomes.is_empty() {
            return;
        }
        let still_running = !self.pollers.is_empty();
        let mut board = self.notices();
        for (_, task_id, outcome) in outcomes {
            match outcome {
                PollOutcome::Finished(TaskStatus::Complete) => {
                    board.success("Podcast is ready!")
                }
                PollOutcome::Finished(status) => {
                    board.error(format!("Podcast task {} {}", task_id, status))
                }
                PollOutcome::Cancelled => {}
            }
        }
        if !still_running {
            board.dismiss_spinner();
        }
    }

    fn notices(&self) -> std::sync::MutexGuard<'_, NoticeBoard> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the backend to generate a podcast for an uploaded file. On success
    /// the task message is appended and polled in the background; its key is
    /// returned. On failure an error message is appended instead.
    pub async fn start_podcast(
        &self,
        server_filename: &str,
        original_name: &str,
    ) -> Result<String, ApiError> {
        let started = match self.api.generate_podcast(server_filename, original_name).await {
            Ok(started) => started,
            Err(e) => {
                warn!("Podcast generation for {} failed to start: {}", original_name, e);
                let message = e.user_message(START_FAILED);
                self.session
                    .add_message(MessageDraft::error(format!("**Podcast Failed:** {}", message)))
                    .await;
                self.notices().error(message);
                return Err(e);
            }
        };

        info!("Podcast task {} started for {}", started.task_id, original_name);
        let task = TaskDescriptor::new_podcast(&started.task_id, original_name);
        let key = self.session.add_message(MessageDraft::task(task)).await;
        self.track(key.clone(), started.task_id, TaskStatus::Processing);
        self.notices()
            .spinner(format!("Generating podcast for {}...", original_name));
        Ok(key)
    }

    fn track(&self, key: String, task_id: String, status: TaskStatus) {
        self.reap_finished();
        let handle = spawn_poller(
            self.api.clone(),
            self.session.clone(),
            key.clone(),
            task_id,
            status,
            self.poll_interval,
        );
        self.pollers.track(key, handle);
    }

    /// Start pollers for every task message still in flight. Returns how many.
    pub async fn resume(&self) -> usize {
        let snapshot = self.session.snapshot().await;
        let pending = snapshot.pending_tasks();
        for (key, task) in &pending {
            self.track(key.to_string(), task.id.clone(), task.status);
        }
        let resumed = pending.len();
        if resumed > 0 {
            info!("Resumed polling for {} task(s)", resumed);
            self.notices()
                .spinner(format!("Waiting on {} podcast task(s)...", resumed));
        }
        resumed
    }

    /// Remove a message. Its poller, if any, is cancelled first.
    pub async fn remove_message(&self, key: &str) -> bool {
        if self.pollers.cancel(key) {
            self.notices()
                .warning("Stopped tracking a podcast that was still generating.");
        }
        self.session.remove(key).await.is_some()
    }

    /// Wait until every tracked task reaches a terminal state.
    pub async fn wait_for_tasks(&self) -> Vec<PollOutcome> {
        let mut outcomes = self.pollers.reap();
        outcomes.extend(self.pollers.wait_all().await);
        self.announce(&outcomes);
        self.notices().dismiss_spinner();
        outcomes.into_iter().map(|(_, _, outcome)| outcome).collect()
    }

    /// Save the current session and start a fresh one. If the save fails the
    /// session is left untouched.
    pub async fn save_and_reset(&self) -> anyhow::Result<Option<PathBuf>> {
        let snapshot = self.session.snapshot().await;
        let saved = self.archive.save(&snapshot).await?;
        self.pollers.shutdown();
        self.notices().dismiss_spinner();
        let id = self.session.reset().await;
        info!("Started new session {}", id);
        self.notices().info("Started a new chat.");
        Ok(saved)
    }

    /// Save without resetting, e.g. on exit.
    pub async fn save(&self) -> anyhow::Result<Option<PathBuf>> {
        let snapshot = self.session.snapshot().await;
        self.archive.save(&snapshot).await
    }

    /// Replace the current session with a saved one and resume its tasks.
    pub async fn load_from_history(&self, session_id: &str) -> anyhow::Result<ChatSession> {
        let saved = self.archive.load(session_id).await?;
        self.pollers.shutdown();
        self.notices().dismiss_spinner();
        self.session.load(saved).await;
        self.resume().await;
        Ok(self.session.snapshot().await)
    }

    pub fn shutdown(&self) {
        self.pollers.shutdown();
    }

    pub fn notice_lines(&self) -> Vec<String> {
        self.reap_finished();
        let mut board = self.notices();
        board.tick();
        board.lines()
    }

    pub fn drain_notices(&self) -> Vec<String> {
        self.reap_finished();
        self.notices().drain_lines()
    }
}
