#![allow(dead_code)]

use cadence_core::date::parse_date;
use cadence_core::SimulationConfig;
use cadence_host::{GitHost, HostError, MemoryHost, TreeEntry};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

pub fn config(start: &str, end: &str, min: i64, max: i64) -> SimulationConfig {
    let mut cfg = SimulationConfig::new(
        "octocat",
        "sandbox",
        parse_date(start).unwrap(),
        parse_date(end).unwrap(),
    );
    cfg.min_commits_per_day = min;
    cfg.max_commits_per_day = max;
    cfg.weekend_intensity = 1.0;
    cfg.seed = Some(42);
    cfg.host.read_retries = 2;
    cfg.host.retry_backoff_ms = 1;
    cfg
}

/// Delegates to a [`MemoryHost`] and cancels `token` once `after` ref
/// updates have succeeded, like a user pressing pause mid-run.
pub struct PauseAfter<'a> {
    pub inner: &'a MemoryHost,
    pub after: usize,
    pub token: CancellationToken,
    updates: AtomicUsize,
}

impl<'a> PauseAfter<'a> {
    pub fn new(inner: &'a MemoryHost, after: usize, token: CancellationToken) -> Self {
        Self {
            inner,
            after,
            token,
            updates: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl GitHost for PauseAfter<'_> {
    async fn repo_exists(&self) -> Result<bool, HostError> {
        self.inner.repo_exists().await
    }

    async fn create_repo(&self, description: &str) -> Result<String, HostError> {
        self.inner.create_repo(description).await
    }

    async fn get_ref(&self, git_ref: &str) -> Result<String, HostError> {
        self.inner.get_ref(git_ref).await
    }

    async fn create_ref(&self, git_ref: &str, sha: &str) -> Result<String, HostError> {
        self.inner.create_ref(git_ref, sha).await
    }

    async fn get_commit(&self, sha: &str) -> Result<String, HostError> {
        self.inner.get_commit(sha).await
    }

    async fn create_blob(&self, content: &str) -> Result<String, HostError> {
        self.inner.create_blob(content).await
    }

    async fn write_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String, HostError> {
        self.inner.write_tree(base_tree, entries).await
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
        date: OffsetDateTime,
        co_authors: &[String],
    ) -> Result<String, HostError> {
        self.inner
            .create_commit(message, tree, parent, date, co_authors)
            .await
    }

    async fn update_ref(&self, git_ref: &str, sha: &str) -> Result<(), HostError> {
        self.inner.update_ref(git_ref, sha).await?;
        if self.updates.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        Ok(())
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<u64, HostError> {
        self.inner.create_issue(title, body, labels).await
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<u64, HostError> {
        self.inner.create_pull_request(title, head, base, body).await
    }

    async fn merge_pull_request(&self, number: u64) -> Result<(), HostError> {
        self.inner.merge_pull_request(number).await
    }
}
