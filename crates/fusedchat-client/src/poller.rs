//! Background status polling for async tasks.
//!
//! One poller per task message. Each poller owns a cancellation token; once
//! it is cancelled the poller makes no further requests and never writes to
//! the session, even if a request was already in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fusedchat_proto::task::{TaskResult, TaskStatus};
use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::StatusSource;
use crate::session::SessionStore;

pub const POLL_FAILED: &str = "Polling failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Terminal status reached and written back.
    Finished(TaskStatus),
    /// Stopped before reaching a terminal status; nothing was written.
    Cancelled,
}

pub struct PollHandle {
    task_id: String,
    cancel: CancellationToken,
    status: watch::Receiver<TaskStatus>,
    join: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Last status seen by the poller.
    pub fn status(&self) -> TaskStatus {
        *self.status.borrow()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> PollOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Poller for task {} ended abnormally: {}", self.task_id, e);
                PollOutcome::Cancelled
            }
        }
    }
}

/// Poll `task_id` every `interval` until it reaches a terminal status, then
/// write the outcome into the message `key`. A failed query counts as a
/// terminal failure.
pub fn spawn_poller<S>(
    source: Arc<S>,
    session: Arc<SessionStore>,
    key: String,
    task_id: String,
    initial: TaskStatus,
    interval: Duration,
) -> PollHandle
where
    S: StatusSource + ?Sized + 'static,
{
    let cancel = CancellationToken::new();
    let (status_tx, status_rx) = watch::channel(initial);

    let token = cancel.clone();
    let id = task_id.clone();
    let join = tokio::spawn(async move {
        debug!("Polling task {} every {:?}", id, interval);
        let (status, result) = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }

            let report = tokio::select! {
                biased;
                _ = token.cancelled() => return PollOutcome::Cancelled,
                report = source.task_status(&id) => report,
            };

            match report {
                Ok(report) if report.status.is_terminal() => {
                    break (report.status, Some(report.into_result()));
                }
                Ok(report) => {
                    status_tx.send_replace(report.status);
                }
                Err(e) => {
                    warn!("Status query for task {} failed: {}", id, e);
                    break (TaskStatus::Failed, Some(TaskResult::failure(POLL_FAILED)));
                }
            }
        };

        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        status_tx.send_replace(status);
        if session.complete_task(&key, status, result).await {
            info!("Task {} finished: {}", id, status);
        } else {
            debug!("Task {} finished but message {} was not updated", id, key);
        }
        PollOutcome::Finished(status)
    });

    PollHandle {
        task_id,
        cancel,
        status: status_rx,
        join,
    }
}

/// Active pollers keyed by message key.
#[derive(Default)]
pub struct PollerSet {
    handles: Mutex<HashMap<String, PollHandle>>,
}

impl PollerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PollHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a poller, cancelling any previous one for the same message.
    pub fn track(&self, key: impl Into<String>, handle: PollHandle) {
        if let Some(old) = self.lock().insert(key.into(), handle) {
            old.cancel();
        }
    }

    /// Stop and forget the poller for `key`. Returns true if it was still
    /// running.
    pub fn cancel(&self, key: &str) -> bool {
        match self.lock().remove(key) {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.cancel();
                running
            }
            None => false,
        }
    }

    /// Pollers that have not stopped yet.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|h| !h.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove pollers that have already stopped. Returns
    /// `(message key, task id, outcome)` for each.
    pub fn reap(&self) -> Vec<(String, String, PollOutcome)> {
        let mut handles = self.lock();
        let finished: Vec<String> = handles
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(key, _)| key.clone())
            .collect();

        let mut reaped = Vec::with_capacity(finished.len());
        for key in finished {
            let Some(handle) = handles.remove(&key) else {
                continue;
            };
            let outcome = match handle.join.now_or_never() {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => {
                    warn!("Poller for task {} ended abnormally: {}", handle.task_id, e);
                    PollOutcome::Cancelled
                }
                None => PollOutcome::Cancelled,
            };
            reaped.push((key, handle.task_id, outcome));
        }
        reaped
    }

    pub fn status(&self, key: &str) -> Option<TaskStatus> {
        self.lock().get(key).map(PollHandle::status)
    }

    pub fn shutdown(&self) {
        for (_, handle) in self.lock().drain() {
            handle.cancel();
        }
    }

    pub async fn wait(&self, key: &str) -> Option<PollOutcome> {
        let handle = self.lock().remove(key)?;
        let guard = handle.cancel.clone().drop_guard();
        let outcome = handle.join().await;
        guard.disarm();
        Some(outcome)
    }

    /// Wait for every tracked poller. Returns `(message key, task id, outcome)`.
    pub async fn wait_all(&self) -> Vec<(String, String, PollOutcome)> {
        let handles: Vec<_> = self.lock().drain().collect();
        join_all(handles.into_iter().map(|(key, handle)| async move {
            let task_id = handle.task_id().to_string();
            // The handles are no longer tracked, so cancel them if this
            // future is dropped before they finish.
            let guard = handle.cancel.clone().drop_guard();
            let outcome = handle.join().await;
            guard.disarm();
            (key, task_id, outcome)
        }))
        .await
    }
}

impl Drop for PollerSet {
    fn drop(&mut self) {
        for handle in self.lock().values() {
            handle.cancel();
        }
    }
}
