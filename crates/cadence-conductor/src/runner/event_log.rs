//! The run log.
//!
//! Entries are kept in memory in creation order. Optionally each one is also
//! appended to a JSONL file and echoed to stdout, either as a console line or
//! as one JSON object per line.

use cadence_core::{LogEntry, LogLevel};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stdout echo mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Echo {
    #[default]
    Off,
    Console,
    Json,
}

/// Append-only log of one run.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    jsonl_path: Option<PathBuf>,
    echo: Echo,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror every entry to `path`, creating parent directories as needed.
    pub fn with_jsonl(mut self, path: impl Into<PathBuf>) -> Self {
        self.jsonl_path = Some(path.into());
        self
    }

    pub fn with_echo(mut self, echo: Echo) -> Self {
        self.echo = echo;
        self
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Record an entry. File and stdout output are best-effort.
    pub fn record(&mut self, entry: LogEntry) {
        if let Some(path) = &self.jsonl_path {
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if let Err(e) = append_line(path, &line) {
                        tracing::warn!(path = %path.display(), error = %e, "event log write failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "event log entry not serializable"),
            }
        }
        match self.echo {
            Echo::Off => {}
            Echo::Console => println!("{}", render_console(&entry)),
            Echo::Json => {
                if let Ok(line) = serde_json::to_string(&entry) {
                    println!("{line}");
                }
            }
        }
        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(LogEntry::new(LogLevel::Info, message));
    }

    pub fn success(&mut self, message: impl Into<String>, details: impl Into<String>) {
        self.record(LogEntry::new(LogLevel::Success, message).with_details(details));
    }

    pub fn warning(&mut self, message: impl Into<String>, details: impl Into<String>) {
        self.record(LogEntry::new(LogLevel::Warning, message).with_details(details));
    }

    pub fn error(&mut self, message: impl Into<String>, details: impl Into<String>) {
        self.record(LogEntry::new(LogLevel::Error, message).with_details(details));
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

fn icon(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "·",
        LogLevel::Success => "✓",
        LogLevel::Warning => "!",
        LogLevel::Error => "✗",
    }
}

/// `[HH:MM:SS] <icon> message`, with details on an indented second line.
pub fn render_console(entry: &LogEntry) -> String {
    let ts = entry.timestamp;
    let mut line = format!(
        "[{:02}:{:02}:{:02}] {} {}",
        ts.hour(),
        ts.minute(),
        ts.second(),
        icon(entry.level),
        entry.message
    );
    if let Some(details) = &entry.details {
        line.push_str("\n           ");
        line.push_str(details);
    }
    line
}
