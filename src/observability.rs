//! # Structured Logging
//!
//! Synchronous, single-line structured logs: one line = one event,
//! severity + event name + alphabetically ordered key/value fields.
//! No buffering and no background threads, so log order matches event
//! order within a task.

use std::fmt::Write as _;
use std::io::{self, Write};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Debug,
    /// Normal operations
    Info,
    /// Recoverable issues
    Warn,
    /// Operation failures
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// Structured event logger.
pub struct Logger;

impl Logger {
    pub fn debug(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Debug, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    /// Write one event line to stderr with fields in alphabetical order.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::format(severity, event, fields);
        // Best-effort: a broken stderr must never fail the operation.
        let _ = writeln!(io::stderr(), "{}", line);
    }

    fn format(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);

        let mut line = String::new();
        let _ = write!(line, "[{}] {}", severity.as_str(), event);
        for (key, value) in sorted {
            let _ = write!(line, " {}={:?}", key, value);
        }
        line
    }
}
