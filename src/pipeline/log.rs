//! Processing log.
//!
//! Each pipeline step records what it saw and did. The log is injected into
//! the orchestrator so callers decide where entries go.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Severity of a processing log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingLogEntry {
    pub timestamp: DateTime<Utc>,
    pub step: String,
    pub content: String,
    pub severity: Severity,
}

impl fmt::Display for ProcessingLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.severity,
            self.step,
            self.content
        )
    }
}

/// Sink for processing log entries.
pub trait ProcessingLog: Send {
    fn record(&mut self, step: &str, content: &str, severity: Severity);
}

/// Keeps entries in memory and mirrors each one to `tracing`.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Vec<ProcessingLogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ProcessingLogEntry] {
        &self.entries
    }

    /// Entries recorded for `step`, oldest first.
    pub fn for_step<'a>(
        &'a self,
        step: &'a str,
    ) -> impl Iterator<Item = &'a ProcessingLogEntry> + 'a {
        self.entries.iter().filter(move |e| e.step == step)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ProcessingLog for MemoryLog {
    fn record(&mut self, step: &str, content: &str, severity: Severity) {
        match severity {
            Severity::Debug => debug!(step, "{}", content),
            Severity::Info => info!(step, "{}", content),
            Severity::Warning => warn!(step, "{}", content),
            Severity::Error => error!(step, "{}", content),
        }

        self.entries.push(ProcessingLogEntry {
            timestamp: Utc::now(),
            step: step.to_string(),
            content: content.to_string(),
            severity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_appends_in_order() {
        let mut log = MemoryLog::new();
        log.record("extract", "SELECT 1", Severity::Info);
        log.record("execute", "1 row(s) in 2 ms", Severity::Info);
        log.record("extract", "second", Severity::Warning);

        let steps: Vec<_> = log.entries().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(steps, vec!["extract", "execute", "extract"]);
        assert_eq!(log.for_step("extract").count(), 2);
        assert!(log.entries()[0].timestamp <= log.entries()[2].timestamp);
    }

    #[test]
    fn test_clear() {
        let mut log = MemoryLog::new();
        log.record("extract", "x", Severity::Debug);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_display() {
        let mut log = MemoryLog::new();
        log.record("translate", "leaked PROPERTIES", Severity::Warning);
        let line = log.entries()[0].to_string();
        assert!(line.ends_with("[warning] translate: leaked PROPERTIES"));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Info > Severity::Debug);
    }
}
