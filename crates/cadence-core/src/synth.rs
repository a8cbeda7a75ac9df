//! Deterministic text synthesis.
//!
//! Every function is a pure function of its input string: the SHA-256 of the
//! seed selects entries from fixed vocabularies. The same seed always yields
//! the same text, which keeps plans reproducible and testable without any
//! generative service.

use sha2::{Digest, Sha256};
use time::Date;

const KINDS: &[&str] = &[
    "feat", "fix", "refactor", "docs", "test", "chore", "perf", "style", "build", "ci",
];

const SCOPES: &[&str] = &[
    "api", "auth", "cache", "cli", "config", "core", "db", "deps", "docs", "http", "parser",
    "ui", "utils", "build",
];

const SUBJECTS: &[&str] = &[
    "handle empty input gracefully",
    "tighten error messages",
    "simplify request retry logic",
    "add missing unit tests",
    "remove dead code paths",
    "update dependency versions",
    "improve logging around startup",
    "fix off-by-one in pagination",
    "document configuration options",
    "cache expensive lookups",
    "validate user input earlier",
    "split large module into smaller files",
    "rename confusing helper functions",
    "reduce allocations in hot loop",
    "guard against missing fields",
    "normalize line endings",
    "clean up unused imports",
    "add timeout to outbound calls",
    "make output deterministic",
    "correct typo in readme",
];

const ISSUE_TOPICS: &[&str] = &[
    "flaky integration tests",
    "slow startup time",
    "memory usage in the cache layer",
    "confusing error messages",
    "missing documentation for configuration",
    "pagination returning duplicate items",
    "timeouts on large uploads",
    "inconsistent date formatting",
    "deprecated dependency warnings",
    "accessibility of the settings page",
];

const ISSUE_OPENERS: &[&str] = &[
    "Investigate",
    "Improve",
    "Fix",
    "Track down",
    "Follow up on",
];

const SNIPPET_EXTENSIONS: &[&str] = &["rs", "py", "ts", "go", "js"];

fn digest(seed: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(seed.as_bytes()));
    out
}

fn pick<'a>(list: &[&'a str], bytes: &[u8; 32], slot: usize) -> &'a str {
    let i = slot * 2 % 30;
    let n = u16::from_be_bytes([bytes[i], bytes[i + 1]]) as usize;
    list[n % list.len()]
}

/// Short hex fingerprint of a seed, handy for unique-but-stable names.
pub fn fingerprint(seed: &str) -> String {
    hex::encode(&digest(seed)[..4])
}

/// A value in `[0, 1)` derived from the seed.
pub fn fraction(seed: &str) -> f64 {
    let bytes = digest(seed);
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    (u64::from_be_bytes(head) >> 11) as f64 / (1u64 << 53) as f64
}

/// Index in `0..len` derived from the seed. `len` must be non-zero.
pub fn index(seed: &str, len: usize) -> usize {
    let bytes = digest(seed);
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[8..16]);
    (u64::from_be_bytes(head) % len as u64) as usize
}

/// Conventional-commit style message: `kind(scope): subject`.
pub fn commit_message(seed: &str) -> String {
    let bytes = digest(seed);
    format!(
        "{}({}): {}",
        pick(KINDS, &bytes, 0),
        pick(SCOPES, &bytes, 1),
        pick(SUBJECTS, &bytes, 2)
    )
}

/// Placeholder message for commit `index` of `date`.
pub fn plan_message(date: Date, index: u32) -> String {
    commit_message(&format!("{}#{index}", crate::date::format_date(date)))
}

pub fn issue_topic(seed: &str) -> String {
    pick(ISSUE_TOPICS, &digest(seed), 0).to_string()
}

/// Templated issue title and body for a topic.
pub fn issue_content(topic: &str) -> (String, String) {
    let bytes = digest(topic);
    let title = format!("{} {}", pick(ISSUE_OPENERS, &bytes, 0), topic);
    let body = format!(
        "## Summary\n\nWe are seeing problems related to {topic}.\n\n\
         ## Steps to reproduce\n\n1. Run the default configuration\n2. Observe the behaviour described above\n\n\
         ## Expected\n\nNo regressions around {topic}."
    );
    (title, body)
}

pub fn issue_label(topic: &str) -> &'static str {
    const LABELS: &[&str] = &["bug", "enhancement", "documentation"];
    LABELS[index(topic, LABELS.len())]
}

/// Relative path for a generated snippet file.
pub fn snippet_path(seed: &str, subject: &str) -> String {
    let ext = SNIPPET_EXTENSIONS[index(seed, SNIPPET_EXTENSIONS.len())];
    let stem = slug(subject);
    let stem = if stem.is_empty() { fingerprint(seed) } else { stem };
    format!("src/snippets/{stem}.{ext}")
}

/// Small placeholder program chosen by file extension.
pub fn code_snippet(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or_default();
    match ext {
        "rs" => format!("// {filename}\npub fn answer() -> u32 {{\n    42\n}}\n"),
        "py" => format!("# {filename}\ndef answer() -> int:\n    return 42\n"),
        "go" => format!("// {filename}\npackage snippets\n\nfunc Answer() int {{\n\treturn 42\n}}\n"),
        "ts" => format!("// {filename}\nexport function answer(): number {{\n  return 42;\n}}\n"),
        _ => format!("// Content for {filename}\nconsole.log('Hello World');\n"),
    }
}

/// Lowercase kebab-case, at most 40 characters.
pub fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
        if out.len() >= 40 {
            break;
        }
    }
    out.trim_end_matches('-').to_string()
}
