//! File sets and timestamps for simulated commits.

use cadence_core::date::format_date;
use cadence_core::synth;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time};

const DAY_START_SECS: i64 = 9 * 3600;
const DAY_WINDOW_SECS: i64 = 11 * 3600;
const EVENING_START_SECS: i64 = 20 * 3600;
const EVENING_WINDOW_SECS: i64 = 4 * 3600;

fn at_offset(date: Date, secs: i64) -> OffsetDateTime {
    PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc() + Duration::seconds(secs)
}

/// Time of commit `index` out of `count` on `date`, evenly spread between
/// 09:00 and 20:00 UTC. Strictly increasing in `index`.
pub fn commit_time(date: Date, index: u32, count: u32) -> OffsetDateTime {
    let slot = DAY_WINDOW_SECS * (i64::from(index) + 1) / (i64::from(count) + 1);
    at_offset(date, DAY_START_SECS + slot)
}

/// Feature-branch commits land after the day's main commits, 20:00–24:00 UTC.
pub fn feature_commit_time(date: Date, index: u32, count: u32) -> OffsetDateTime {
    let slot = EVENING_WINDOW_SECS * (i64::from(index) + 1) / (i64::from(count) + 1);
    at_offset(date, EVENING_START_SECS + slot)
}

pub fn activity_path(date: Date) -> String {
    format!("activity/{}.md", format_date(date))
}

/// The day's activity file after the given commits.
pub fn activity_content(date: Date, messages: &[String]) -> String {
    let mut out = format!("# Activity {}\n\n", format_date(date));
    for msg in messages {
        out.push_str("- ");
        out.push_str(msg);
        out.push('\n');
    }
    out
}

/// `feature/<date>-<fingerprint>`. Unique per date, repository and run, so
/// a later run over the same dates never meets an existing branch.
pub fn feature_branch(date: Date, repo: &str, run_id: &str) -> String {
    let day = format_date(date);
    format!(
        "feature/{day}-{}",
        synth::fingerprint(&format!("{repo}/{day}/{run_id}"))
    )
}

pub fn feature_notes_path(branch: &str) -> String {
    let name = branch.rsplit('/').next().unwrap_or(branch);
    format!("notes/{name}.md")
}

pub fn feature_notes(branch: &str, messages: &[String]) -> String {
    let mut out = format!("# {branch}\n\n");
    for msg in messages {
        out.push_str("- ");
        out.push_str(msg);
        out.push('\n');
    }
    out
}
