//! Text artifacts for simulated activity.
//!
//! A [`ContentProvider`] never fails: every operation returns a value, and a
//! provider that could not produce fresh content returns a deterministic
//! fallback together with the reason.

pub mod gemini;
pub mod local;

pub use gemini::GeminiProvider;
pub use local::LocalProvider;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Issue title and body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueContent {
    pub title: String,
    pub body: String,
}

/// A generated value, plus the reason when it is a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub fallback: Option<String>,
}

impl<T> Generated<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            fallback: None,
        }
    }

    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            fallback: Some(reason.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Producer of commit messages, issues and code snippets.
#[async_trait::async_trait]
pub trait ContentProvider: Send + Sync {
    /// Short conventional commit message for the given context.
    async fn commit_message(&self, context: &str) -> Generated<String>;

    async fn issue_content(&self, topic: &str) -> Generated<IssueContent>;

    /// Small code file body for `filename`.
    async fn code_snippet(&self, filename: &str) -> Generated<String>;
}

/// Templated issue used when structured output is unusable.
pub fn fallback_issue(topic: &str) -> IssueContent {
    IssueContent {
        title: format!("Issue regarding {topic}"),
        body: "Please investigate this item further.".into(),
    }
}

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[\w+-]*[ \t]*\r?\n?").unwrap());

/// Remove markdown code fences, keeping the fenced text.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_OPEN.replace_all(text, "").replace("```", "")
}

/// Parse free text that should hold `{"title": ..., "body": ...}`.
pub fn parse_issue_json(text: &str) -> Result<IssueContent, String> {
    let cleaned = strip_code_fences(text);
    let issue: IssueContent =
        serde_json::from_str(cleaned.trim()).map_err(|e| format!("malformed issue JSON: {e}"))?;
    if issue.title.trim().is_empty() {
        return Err("issue JSON has an empty title".into());
    }
    Ok(IssueContent {
        title: issue.title.trim().to_string(),
        body: issue.body.trim().to_string(),
    })
}
