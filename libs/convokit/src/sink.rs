//! Diagnostic log sink.
//!
//! Pipeline diagnostics are pushed into an explicit [`LogSink`] handed to the
//! client, never to a global logger. [`TracingSink`] forwards to `tracing`,
//! [`NoopSink`] drops everything and [`MemorySink`] keeps entries for inspection.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Fatal,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        })
    }
}

/// Receiver of pipeline diagnostics. Must be reentrant and must not fail.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, details: Option<&Value>);
}

/// Forwards diagnostics to `tracing` under the `convokit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, details: Option<&Value>) {
        let details = details.map(ToString::to_string);
        let details = details.as_deref().unwrap_or("");
        match level {
            LogLevel::Fatal => {
                tracing::error!(target: "convokit", fatal = true, details, "{message}");
            }
            LogLevel::Error => tracing::error!(target: "convokit", details, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "convokit", details, "{message}"),
            LogLevel::Info => tracing::info!(target: "convokit", details, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "convokit", details, "{message}"),
            LogLevel::Trace => tracing::trace!(target: "convokit", details, "{message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn log(&self, _level: LogLevel, _message: &str, _details: Option<&Value>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub details: Option<Value>,
}

/// Sink that records every entry in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    #[must_use]
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries().iter().filter(|e| e.level == level).count()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str, details: Option<&Value>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEntry {
                level,
                message: message.to_owned(),
                details: details.cloned(),
            });
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.log(LogLevel::Info, "first", None);
        sink.log(LogLevel::Error, "second", Some(&json!({"error": "boom"})));
        assert_eq!(sink.messages(), vec!["first", "second"]);
        assert_eq!(sink.count(LogLevel::Error), 1);
        assert_eq!(sink.entries()[1].details, Some(json!({"error": "boom"})));
    }

    #[test]
    #[traced_test]
    fn tracing_sink_forwards_events() {
        TracingSink.log(LogLevel::Warn, "users.findMany: ids ignored", Some(&json!({"ids": 2})));
        TracingSink.log(LogLevel::Fatal, "fatal thing", None);
        assert!(logs_contain("users.findMany: ids ignored"));
        assert!(logs_contain("fatal=true"));
    }

    #[test]
    fn noop_sink_is_silent() {
        NoopSink.log(LogLevel::Error, "dropped", None);
    }

    #[test]
    fn level_names() {
        assert_eq!(LogLevel::Fatal.to_string(), "fatal");
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
