//! Gemini-backed provider. Any failure degrades to [`synth`] output.

use crate::{fallback_issue, parse_issue_json, strip_code_fences, ContentProvider, Generated, IssueContent};
use cadence_core::synth;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Why a generation attempt produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum ContentProviderError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response contained no text")]
    Empty,
}

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    async fn generate(&self, prompt: &str, json_mode: bool) -> Result<String, ContentProviderError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = request_body(prompt, json_mode);
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ContentProviderError::Status {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|e| ContentProviderError::Transport(e.to_string()))?;
        response_text(&value).ok_or(ContentProviderError::Empty)
    }
}

fn request_body(prompt: &str, json_mode: bool) -> Value {
    let mut body = json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    });
    if json_mode {
        body["generationConfig"] = json!({ "responseMimeType": "application/json" });
    }
    body
}

/// Concatenated text parts of the first candidate, if non-blank.
fn response_text(value: &Value) -> Option<String> {
    let parts = value
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

/// Strip fences and wrapping quotes a model tends to add around a one-liner.
fn clean_message(text: &str) -> String {
    strip_code_fences(text)
        .trim()
        .trim_matches(|c| c == '"' || c == '`' || c == '\'')
        .trim()
        .to_string()
}

#[async_trait::async_trait]
impl ContentProvider for GeminiProvider {
    async fn commit_message(&self, context: &str) -> Generated<String> {
        let prompt = format!(
            "Generate a short, realistic, conventional commit message for a software project. \
             Context: {context}. Return ONLY the message string."
        );
        match self.generate(&prompt, false).await {
            Ok(text) => {
                let msg = clean_message(&text);
                if msg.is_empty() {
                    Generated::degraded(synth::commit_message(context), "empty commit message")
                } else {
                    Generated::fresh(msg)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "commit message generation failed");
                Generated::degraded(synth::commit_message(context), e.to_string())
            }
        }
    }

    async fn issue_content(&self, topic: &str) -> Generated<IssueContent> {
        let prompt = format!(
            "Generate a realistic GitHub issue about {topic}. \
             Return strictly JSON format with \"title\" and \"body\" keys."
        );
        match self.generate(&prompt, true).await {
            Ok(text) => match parse_issue_json(&text) {
                Ok(issue) => Generated::fresh(issue),
                Err(reason) => {
                    tracing::warn!(%reason, "issue generation returned unusable JSON");
                    Generated::degraded(fallback_issue(topic), reason)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "issue generation failed");
                Generated::degraded(fallback_issue(topic), e.to_string())
            }
        }
    }

    async fn code_snippet(&self, filename: &str) -> Generated<String> {
        let prompt = format!(
            "Write a small, valid code snippet for a file named \"{filename}\". \
             Keep it under 20 lines. Return only the code."
        );
        match self.generate(&prompt, false).await {
            Ok(text) => {
                let code = strip_code_fences(&text);
                if code.trim().is_empty() {
                    Generated::degraded(synth::code_snippet(filename), "empty code snippet")
                } else {
                    Generated::fresh(code)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "code snippet generation failed");
                Generated::degraded(synth::code_snippet(filename), e.to_string())
            }
        }
    }
}
