//! Append-only run log.
//!
//! Every observable action in a run is appended here. Entries are held in
//! memory for the process lifetime and mirrored to a JSONL file sink when
//! one is configured. Logging must never abort the workflow: if the sink
//! cannot be written, the log degrades to in-memory-only silently.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One timestamped record of something the orchestrator did or observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Append-only, per-run log. Created at orchestrator construction and owned
/// by it; never a process-wide static.
#[derive(Debug)]
pub struct RunLog {
    entries: Vec<LogEntry>,
    sink: Option<PathBuf>,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLog {
    /// In-memory-only log.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            sink: None,
        }
    }

    /// Log that also appends each entry to a JSONL file. The sink is an
    /// audit copy only; it is never read back.
    pub fn with_sink(path: PathBuf) -> Self {
        let sink = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if std::fs::create_dir_all(parent).is_ok() {
                    Some(path)
                } else {
                    None
                }
            }
            _ => Some(path),
        };
        Self {
            entries: Vec::new(),
            sink,
        }
    }

    /// Append one entry. Never fails; a broken sink is dropped silently.
    pub fn append(&mut self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        };

        match severity {
            Severity::Info => info!("{}", entry.message),
            Severity::Warn => warn!("{}", entry.message),
            Severity::Error => error!("{}", entry.message),
        }

        if let Some(path) = &self.sink {
            if write_line(path, &entry).is_err() {
                self.sink = None;
            }
        }

        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.append(Severity::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.append(Severity::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.append(Severity::Error, message);
    }

    /// Immutable copy of all entries so far, in append order. Taking the
    /// snapshot twice without intervening appends yields identical content.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the JSONL sink, if one is still attached.
    pub fn sink_path(&self) -> Option<&PathBuf> {
        self.sink.as_ref()
    }
}

fn write_line(path: &PathBuf, entry: &LogEntry) -> std::io::Result<()> {
    let json = serde_json::to_string(entry)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    file.flush()
}
