//! Ingestion log, streamed to browsers via Server-Sent Events (SSE).
//!
//! Every entry is mirrored to `tracing`, so the same messages reach the
//! process log whether or not a browser is connected.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered entries per subscriber before slow clients start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Log level shown to SSE clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth, for per-sheet lines under a pass.
    #[serde(default)]
    pub indent: u8,
    pub at: DateTime<Local>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            at: Local::now(),
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fans log entries out to every connected SSE client.
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn log(&self, entry: LogEntry) {
        let indent = "  ".repeat(entry.indent as usize);
        match entry.level {
            LogLevel::Info => tracing::info!(target: "ingest", "{}{}", indent, entry.message),
            LogLevel::Success => tracing::info!(target: "ingest", ok = true, "{}{}", indent, entry.message),
            LogLevel::Warning => tracing::warn!(target: "ingest", "{}{}", indent, entry.message),
            LogLevel::Error => tracing::error!(target: "ingest", "{}{}", indent, entry.message),
        }

        // No receivers is the normal case without a browser attached
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_receives_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::new(LogLevel::Warning, "2 offerings have an unreadable date range"));
        broadcaster.log(LogEntry::new(LogLevel::Info, "Monday: 4 rows").with_indent(1));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, LogLevel::Warning);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.indent, 1);
    }

    #[test]
    fn test_log_without_subscribers_is_fine() {
        LogBroadcaster::new().log(LogEntry::new(LogLevel::Error, "nobody listening"));
    }

    #[test]
    fn test_entry_json() {
        let value = serde_json::to_value(LogEntry::new(LogLevel::Success, "done")).unwrap();
        assert_eq!(value["level"], "success");
        assert_eq!(value["message"], "done");
        assert!(value.get("at").is_some());
    }
}
