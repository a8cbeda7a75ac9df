//! Git object API as seen by the simulation.
//!
//! Every method is a single remote round trip (except [`GitHost::create_tree`],
//! which creates one blob per file first). No method is idempotent: repeating
//! a create produces a duplicate object, so callers must not re-issue a create
//! that already succeeded.

pub mod error;
pub mod github;
pub mod memory;

pub use error::{HostError, HostOp};
pub use github::GitHubClient;
pub use memory::MemoryHost;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A file to place in a tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitFile {
    pub path: String,
    pub content: String,
}

impl GitFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A blob-backed tree entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// Regular (non-executable) file entry.
    pub fn blob(path: &str, sha: String) -> Self {
        Self {
            path: path.to_string(),
            mode: "100644".into(),
            kind: "blob".into(),
            sha,
        }
    }
}

/// `heads/<branch>`, the ref form every [`GitHost`] method takes.
pub fn branch_ref(branch: &str) -> String {
    format!("heads/{branch}")
}

/// Append one `Co-authored-by:` trailer per co-author, after a blank line.
pub fn commit_message_with_trailers(message: &str, co_authors: &[String]) -> String {
    if co_authors.is_empty() {
        return message.to_string();
    }
    let trailers: Vec<String> = co_authors
        .iter()
        .map(|a| format!("Co-authored-by: {a}"))
        .collect();
    format!("{message}\n\n{}", trailers.join("\n"))
}

/// Remote git host. Implemented by [`GitHubClient`] (real) and [`MemoryHost`] (tests, dry runs).
#[async_trait::async_trait]
pub trait GitHost: Send + Sync {
    async fn repo_exists(&self) -> Result<bool, HostError>;

    /// Create the repository with an initial commit. Returns its full name.
    async fn create_repo(&self, description: &str) -> Result<String, HostError>;

    /// Current commit SHA of a ref such as `heads/main`.
    async fn get_ref(&self, git_ref: &str) -> Result<String, HostError>;

    /// Create `git_ref` pointing at `sha`. Returns the fully qualified ref name.
    async fn create_ref(&self, git_ref: &str, sha: &str) -> Result<String, HostError>;

    /// Tree SHA of a commit.
    async fn get_commit(&self, sha: &str) -> Result<String, HostError>;

    async fn create_blob(&self, content: &str) -> Result<String, HostError>;

    /// Create a tree layering `entries` over `base_tree`.
    async fn write_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String, HostError>;

    /// Create one blob per file, in order, then the tree. The first blob
    /// failure aborts before any tree call is made.
    async fn create_tree(&self, base_tree: &str, files: &[GitFile]) -> Result<String, HostError> {
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let sha = self.create_blob(&file.content).await?;
            entries.push(TreeEntry::blob(&file.path, sha));
        }
        self.write_tree(base_tree, &entries).await
    }

    /// Create a single-parent commit. `date` becomes both author and committer
    /// date; co-authors are appended as trailers.
    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
        date: OffsetDateTime,
        co_authors: &[String],
    ) -> Result<String, HostError>;

    /// Move `git_ref` to `sha`. Always a force update.
    async fn update_ref(&self, git_ref: &str, sha: &str) -> Result<(), HostError>;

    /// Returns the issue number.
    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<u64, HostError>;

    /// `head` and `base` are branch names. Returns the PR number.
    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<u64, HostError>;

    /// Squash-merge a pull request into its base branch.
    async fn merge_pull_request(&self, number: u64) -> Result<(), HostError>;
}
