use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::{Date, OffsetDateTime};

// ── Plan ──

/// Commits planned for a single calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    #[serde(with = "crate::date::ymd")]
    pub date: Date,
    pub count: u32,
    /// One message per planned commit. Always `count` entries.
    pub messages: Vec<String>,
    #[serde(default)]
    pub open_issue: bool,
    #[serde(default)]
    pub open_pull_request: bool,
}

/// Day records in ascending date order, one per calendar day of the range.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CommitPlan {
    pub days: Vec<DayPlan>,
}

impl CommitPlan {
    pub fn new(days: Vec<DayPlan>) -> Self {
        Self { days }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_commits(&self) -> u64 {
        self.days.iter().map(|d| u64::from(d.count)).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DayPlan> {
        self.days.iter()
    }
}

/// Read-only summary derived from a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulationStats {
    pub total_commits: u64,
    pub total_days: usize,
    pub estimated_duration_secs: f64,
}

impl SimulationStats {
    /// Saturates at `Duration::MAX` for estimates too large to represent.
    pub fn estimated_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.estimated_duration_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// `1h 05m`, `3m 20s` or `12s`.
    pub fn duration_label(&self) -> String {
        let secs = self.estimated_duration().as_secs();
        let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
        if h > 0 {
            format!("{h}h {m:02}m")
        } else if m > 0 {
            format!("{m}m {s:02}s")
        } else {
            format!("{s}s")
        }
    }
}

// ── Run status ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SimulationStatus {
    Idle,
    Planning,
    Running,
    Paused,
    Completed,
    Error,
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SimulationStatus::Idle => "IDLE",
            SimulationStatus::Planning => "PLANNING",
            SimulationStatus::Running => "RUNNING",
            SimulationStatus::Paused => "PAUSED",
            SimulationStatus::Completed => "COMPLETED",
            SimulationStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Log entries ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of the run log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            timestamp: OffsetDateTime::now_utc(),
            level,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::parse_date;

    fn day(date: &str, count: u32) -> DayPlan {
        DayPlan {
            date: parse_date(date).unwrap(),
            count,
            messages: (0..count).map(|i| format!("m{i}")).collect(),
            open_issue: false,
            open_pull_request: false,
        }
    }

    #[test]
    fn plan_totals() {
        let plan = CommitPlan::new(vec![day("2024-01-01", 2), day("2024-01-02", 0), day("2024-01-03", 5)]);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.total_commits(), 7);
    }

    #[test]
    fn duration_labels() {
        let stats = |secs: f64| SimulationStats {
            total_commits: 0,
            total_days: 0,
            estimated_duration_secs: secs,
        };
        assert_eq!(stats(12.0).duration_label(), "12s");
        assert_eq!(stats(200.0).duration_label(), "3m 20s");
        assert_eq!(stats(3900.0).duration_label(), "1h 05m");
    }

    #[test]
    fn oversized_estimate_saturates() {
        let stats = SimulationStats {
            total_commits: 3,
            total_days: 1,
            estimated_duration_secs: 3.0 * 1e300,
        };
        assert_eq!(stats.estimated_duration(), Duration::MAX);
        assert!(stats.duration_label().ends_with('m'));
        let infinite = SimulationStats {
            estimated_duration_secs: f64::INFINITY,
            ..stats
        };
        assert_eq!(infinite.estimated_duration(), Duration::MAX);
    }

    #[test]
    fn day_plan_serializes_plain_date() {
        let json = serde_json::to_string(&day("2024-01-01", 1)).unwrap();
        assert!(json.contains(r#""date":"2024-01-01""#));
        let back: DayPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.count, 1);
    }

    #[test]
    fn status_serialization_is_uppercase() {
        let json = serde_json::to_string(&SimulationStatus::Paused).unwrap();
        assert_eq!(json, r#""PAUSED""#);
        assert!(SimulationStatus::Completed.is_terminal());
        assert!(SimulationStatus::Error.is_terminal());
        assert!(!SimulationStatus::Paused.is_terminal());
    }

    #[test]
    fn log_entries_get_unique_ids() {
        let a = LogEntry::new(LogLevel::Info, "a");
        let b = LogEntry::new(LogLevel::Info, "b").with_details("more");
        assert_ne!(a.id, b.id);
        assert_eq!(b.details.as_deref(), Some("more"));
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains(r#""level":"info""#));
        assert!(!json.contains("details"));
    }
}
