//! GitHub REST client for the git-data, issues and pulls endpoints.

use crate::{commit_message_with_trailers, GitHost, HostError, HostOp, TreeEntry};
use cadence_core::SimulationConfig;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const USER_AGENT: &str = concat!("cadence/", env!("CARGO_PKG_VERSION"));

/// Name and email written into author and committer.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    identity: CommitIdentity,
}

// ── Wire types ──

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct RefObject {
    object: ShaOnly,
}

#[derive(Deserialize)]
struct RefCreated {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct CommitObject {
    tree: ShaOnly,
}

#[derive(Deserialize)]
struct Numbered {
    number: u64,
}

#[derive(Deserialize)]
struct RepoInfo {
    full_name: String,
}

impl GitHubClient {
    pub fn new(
        api_base: &str,
        token: &str,
        owner: &str,
        repo: &str,
        identity: CommitIdentity,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            identity,
        })
    }

    pub fn from_config(config: &SimulationConfig, token: &str) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.host.api_base,
            token,
            &config.owner,
            &config.repo,
            CommitIdentity {
                name: config.author_name(),
                email: config.author_email(),
            },
            Duration::from_secs(config.host.request_timeout_secs),
        )
    }

    fn repo_url(&self, endpoint: &str) -> String {
        format!(
            "{}/repos/{}/{}{endpoint}",
            self.api_base, self.owner, self.repo
        )
    }

    async fn send(
        &self,
        op: HostOp,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, HostError> {
        tracing::debug!(op = %op, method = method.as_str(), url, "github request");
        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| HostError::unavailable(op, e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(HostError::status(op, status.as_u16(), error_message(status, &text)))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        op: HostOp,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, HostError> {
        let resp = self.send(op, method, url, body).await?;
        resp.json::<T>().await.map_err(|e| HostError::Protocol {
            op,
            message: e.to_string(),
        })
    }
}

/// The `message` field of a GitHub error body, else the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}

/// Request body for `POST /git/commits`.
pub fn commit_payload(
    message: &str,
    tree: &str,
    parent: &str,
    date: OffsetDateTime,
    co_authors: &[String],
    identity: &CommitIdentity,
) -> Result<Value, HostError> {
    let date = date.format(&Rfc3339).map_err(|e| HostError::Protocol {
        op: HostOp::CreateCommit,
        message: format!("unformattable commit date: {e}"),
    })?;
    let person = json!({
        "name": identity.name,
        "email": identity.email,
        "date": date,
    });
    Ok(json!({
        "message": commit_message_with_trailers(message, co_authors),
        "tree": tree,
        "parents": [parent],
        "author": person,
        "committer": person,
    }))
}

#[async_trait::async_trait]
impl GitHost for GitHubClient {
    async fn repo_exists(&self) -> Result<bool, HostError> {
        match self
            .send(HostOp::RepoExists, Method::GET, &self.repo_url(""), None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_repo(&self, description: &str) -> Result<String, HostError> {
        let body = json!({
            "name": self.repo,
            "description": description,
            "private": false,
            "auto_init": true,
        });
        let url = format!("{}/user/repos", self.api_base);
        let info: RepoInfo = self
            .request(HostOp::CreateRepo, Method::POST, &url, Some(&body))
            .await?;
        Ok(info.full_name)
    }

    async fn get_ref(&self, git_ref: &str) -> Result<String, HostError> {
        let url = self.repo_url(&format!("/git/ref/{git_ref}"));
        let r: RefObject = self.request(HostOp::GetRef, Method::GET, &url, None).await?;
        Ok(r.object.sha)
    }

    async fn create_ref(&self, git_ref: &str, sha: &str) -> Result<String, HostError> {
        let body = json!({ "ref": format!("refs/{git_ref}"), "sha": sha });
        let r: RefCreated = self
            .request(HostOp::CreateRef, Method::POST, &self.repo_url("/git/refs"), Some(&body))
            .await?;
        Ok(r.name)
    }

    async fn get_commit(&self, sha: &str) -> Result<String, HostError> {
        let url = self.repo_url(&format!("/git/commits/{sha}"));
        let c: CommitObject = self.request(HostOp::GetCommit, Method::GET, &url, None).await?;
        Ok(c.tree.sha)
    }

    async fn create_blob(&self, content: &str) -> Result<String, HostError> {
        let body = json!({ "content": content, "encoding": "utf-8" });
        let r: ShaOnly = self
            .request(HostOp::CreateBlob, Method::POST, &self.repo_url("/git/blobs"), Some(&body))
            .await?;
        Ok(r.sha)
    }

    async fn write_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String, HostError> {
        let body = json!({ "base_tree": base_tree, "tree": entries });
        let r: ShaOnly = self
            .request(HostOp::CreateTree, Method::POST, &self.repo_url("/git/trees"), Some(&body))
            .await?;
        Ok(r.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
        date: OffsetDateTime,
        co_authors: &[String],
    ) -> Result<String, HostError> {
        let body = commit_payload(message, tree, parent, date, co_authors, &self.identity)?;
        let r: ShaOnly = self
            .request(HostOp::CreateCommit, Method::POST, &self.repo_url("/git/commits"), Some(&body))
            .await?;
        Ok(r.sha)
    }

    async fn update_ref(&self, git_ref: &str, sha: &str) -> Result<(), HostError> {
        let body = json!({ "sha": sha, "force": true });
        let url = self.repo_url(&format!("/git/refs/{git_ref}"));
        self.send(HostOp::UpdateRef, Method::PATCH, &url, Some(&body))
            .await?;
        Ok(())
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<u64, HostError> {
        let payload = json!({ "title": title, "body": body, "labels": labels });
        let r: Numbered = self
            .request(HostOp::CreateIssue, Method::POST, &self.repo_url("/issues"), Some(&payload))
            .await?;
        Ok(r.number)
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<u64, HostError> {
        let payload = json!({ "title": title, "head": head, "base": base, "body": body });
        let r: Numbered = self
            .request(HostOp::CreatePullRequest, Method::POST, &self.repo_url("/pulls"), Some(&payload))
            .await?;
        Ok(r.number)
    }

    async fn merge_pull_request(&self, number: u64) -> Result<(), HostError> {
        let payload = json!({ "merge_method": "squash" });
        let url = self.repo_url(&format!("/pulls/{number}/merge"));
        self.send(HostOp::MergePullRequest, Method::PUT, &url, Some(&payload))
            .await?;
        Ok(())
    }
}
