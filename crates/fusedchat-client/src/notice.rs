//! Transient status notices for the terminal.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn icon(self) -> &'static str {
        match self {
            Severity::Info => "·",
            Severity::Success => "✓",
            Severity::Warning => "!",
            Severity::Error => "✗",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity.icon(), self.message)
    }
}

struct Entry {
    notice: Notice,
    expires: Instant,
}

/// Spinner shown while background work is outstanding.
struct Spinner {
    message: String,
    frame: usize,
}

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub struct NoticeBoard {
    notices: VecDeque<Entry>,
    spinner: Option<Spinner>,
    max_visible: usize,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self {
            notices: VecDeque::new(),
            spinner: None,
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, duration: Duration) {
        let message = message.into();
        self.notices.retain(|e| e.notice.message != message);
        self.notices.push_back(Entry {
            notice: Notice { message, severity },
            expires: Instant::now() + duration,
        });
        while self.notices.len() > self.max_visible * 2 {
            self.notices.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Info, Duration::from_secs(3));
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Success, Duration::from_secs(3));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Warning, Duration::from_secs(4));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Error, Duration::from_secs(5));
    }

    /// Start or replace the spinner. It stays until resolved or dismissed.
    pub fn spinner(&mut self, message: impl Into<String>) {
        self.spinner = Some(Spinner {
            message: message.into(),
            frame: 0,
        });
    }

    pub fn dismiss_spinner(&mut self) {
        self.spinner = None;
    }

    /// Remove expired notices and advance the spinner frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.notices.retain(|e| e.expires > now);
        if let Some(ref mut s) = self.spinner {
            s.frame = (s.frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && self.spinner.is_none()
    }

    /// Printable lines, spinner first, then newest notices.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(ref s) = self.spinner {
            lines.push(format!(
                "{} {}",
                SPINNER_FRAMES[s.frame % SPINNER_FRAMES.len()],
                s.message
            ));
        }
        lines.extend(
            self.notices
                .iter()
                .rev()
                .take(self.max_visible)
                .map(|e| e.notice.to_string()),
        );
        lines
    }

    /// Take every queued notice, oldest first. The spinner is left alone.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.notices.drain(..).map(|e| e.notice).collect()
    }

    pub fn drain_lines(&mut self) -> Vec<String> {
        self.drain().iter().map(Notice::to_string).collect()
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new()
    }
}
