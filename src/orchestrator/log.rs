//! Append-only run log.
//!
//! Lines are kept in order, broadcast to live subscribers and mirrored to
//! `tracing`. Nothing is ever dropped from the log itself; only the live
//! broadcast is bounded, and a subscriber that falls more than `buffer`
//! lines behind sees `RecvError::Lagged` and can catch up from `snapshot`.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// RFC 3339 timestamp.
    pub at: String,
}

#[derive(Debug)]
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

impl RunLog {
    /// An empty log whose live broadcast holds up to `buffer` lines.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            entries: Mutex::new(Vec::new()),
            tx,
        }
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!(target: "fff_graph::run", "{message}"),
            LogLevel::Success => tracing::info!(target: "fff_graph::run", success = true, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "fff_graph::run", "{message}"),
            LogLevel::Error => tracing::error!(target: "fff_graph::run", "{message}"),
        }
        let entry = LogEntry {
            level,
            message,
            at: now_rfc3339(),
        };
        self.lock().push(entry.clone());
        // No subscribers is fine.
        let _ = self.tx.send(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(LogLevel::Success, message);
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Message text only, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new(256)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
