//! In-memory git host.
//!
//! Behaves like the GitHub git-data API closely enough to exercise the
//! orchestrator: content-addressed objects, refs that must exist before they
//! are updated, squash merges, issue/PR numbering. Every call is recorded and
//! faults can be injected per operation and occurrence.

use crate::{commit_message_with_trailers, GitHost, HostError, HostOp, TreeEntry};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCommit {
    pub sha: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub message: String,
    pub date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPull {
    pub number: u64,
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub merged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FaultKind {
    /// Return the error without touching state.
    Fail,
    /// Apply the mutation, then return the error.
    LoseResponse,
}

#[derive(Debug, Clone)]
struct Fault {
    op: HostOp,
    nth: usize,
    kind: FaultKind,
    error: HostError,
}

#[derive(Debug, Default)]
struct Store {
    repo_exists: bool,
    default_branch: String,
    blobs: HashMap<String, String>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, MemoryCommit>,
    refs: BTreeMap<String, String>,
    issues: Vec<MemoryIssue>,
    pulls: Vec<MemoryPull>,
    last_number: u64,
    calls: Vec<HostOp>,
    faults: Vec<Fault>,
}

impl Store {
    /// Record a call. `Err` means fail now; `Ok(Some)` means apply, then fail.
    fn record(&mut self, op: HostOp) -> Result<Option<HostError>, HostError> {
        self.calls.push(op);
        let nth = self.calls.iter().filter(|c| **c == op).count();
        let fault = self
            .faults
            .iter()
            .find(|f| f.op == op && f.nth == nth)
            .cloned();
        if let Some(f) = fault {
            return match f.kind {
                FaultKind::Fail => Err(f.error),
                FaultKind::LoseResponse => Ok(Some(f.error)),
            };
        }
        if !self.repo_exists && !matches!(op, HostOp::RepoExists | HostOp::CreateRepo) {
            return Err(HostError::status(op, 404, "Not Found"));
        }
        Ok(None)
    }

    fn put_tree(&mut self, files: BTreeMap<String, String>) -> String {
        let listing: String = files
            .iter()
            .map(|(path, blob)| format!("{path} {blob}\n"))
            .collect();
        let sha = object_sha("tree", &listing);
        self.trees.insert(sha.clone(), files);
        sha
    }

    fn put_commit(
        &mut self,
        tree: &str,
        parents: Vec<String>,
        message: String,
        date: OffsetDateTime,
    ) -> String {
        let payload = format!(
            "tree {tree}\nparents {}\ndate {}\n\n{message}",
            parents.join(" "),
            date.unix_timestamp_nanos()
        );
        let sha = object_sha("commit", &payload);
        self.commits.insert(
            sha.clone(),
            MemoryCommit {
                sha: sha.clone(),
                tree: tree.to_string(),
                parents,
                message,
                date,
            },
        );
        sha
    }

    fn seed_branch(&mut self, branch: &str) {
        let readme = "# sandbox\n".to_string();
        let blob = object_sha("blob", &readme);
        self.blobs.insert(blob.clone(), readme);
        let tree = self.put_tree(BTreeMap::from([("README.md".to_string(), blob)]));
        let root = self.put_commit(
            &tree,
            Vec::new(),
            "Initial commit".into(),
            OffsetDateTime::UNIX_EPOCH,
        );
        self.refs.insert(format!("heads/{branch}"), root);
        self.default_branch = branch.to_string();
        self.repo_exists = true;
    }
}

fn respond<T>(lost: Option<HostError>, value: T) -> Result<T, HostError> {
    match lost {
        Some(e) => Err(e),
        None => Ok(value),
    }
}

/// Git-style 40-hex identifier (SHA-256 truncated) of a typed payload.
fn object_sha(kind: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())[..40].to_string()
}

fn unprocessable(op: HostOp, message: &str) -> HostError {
    HostError::status(op, 422, message)
}

pub struct MemoryHost {
    store: Mutex<Store>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// A host where the repository does not exist yet.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                default_branch: "main".into(),
                ..Default::default()
            }),
        }
    }

    /// A host with an existing repository whose `branch` holds one initial commit.
    pub fn with_branch(branch: &str) -> Self {
        let host = Self::new();
        host.lock().seed_branch(branch);
        host
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the `nth` (1-based) call of `op` fail without side effects.
    pub fn fail_nth(&self, op: HostOp, nth: usize, error: HostError) {
        self.lock().faults.push(Fault {
            op,
            nth,
            kind: FaultKind::Fail,
            error,
        });
    }

    /// Apply the `nth` call of `op` but report a transport failure, as if the
    /// response was lost in flight.
    pub fn lose_response_nth(&self, op: HostOp, nth: usize) {
        self.lock().faults.push(Fault {
            op,
            nth,
            kind: FaultKind::LoseResponse,
            error: HostError::unavailable(op, "connection reset before response"),
        });
    }

    pub fn calls(&self) -> Vec<HostOp> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: HostOp) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn repo_created(&self) -> bool {
        self.lock().repo_exists
    }

    pub fn ref_sha(&self, git_ref: &str) -> Option<String> {
        self.lock().refs.get(git_ref).cloned()
    }

    pub fn refs(&self) -> BTreeMap<String, String> {
        self.lock().refs.clone()
    }

    pub fn commit(&self, sha: &str) -> Option<MemoryCommit> {
        self.lock().commits.get(sha).cloned()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits.len()
    }

    /// File contents of a tree, by path.
    pub fn tree_files(&self, tree: &str) -> BTreeMap<String, String> {
        let store = self.lock();
        store
            .trees
            .get(tree)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(path, blob)| {
                        store.blobs.get(blob).map(|c| (path.clone(), c.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Commits reachable from `git_ref` by first parent, newest first.
    pub fn history(&self, git_ref: &str) -> Vec<MemoryCommit> {
        let store = self.lock();
        let mut out = Vec::new();
        let mut cursor = store.refs.get(git_ref).cloned();
        while let Some(sha) = cursor {
            match store.commits.get(&sha) {
                Some(c) => {
                    cursor = c.parents.first().cloned();
                    out.push(c.clone());
                }
                None => break,
            }
        }
        out
    }

    pub fn issues(&self) -> Vec<MemoryIssue> {
        self.lock().issues.clone()
    }

    pub fn pulls(&self) -> Vec<MemoryPull> {
        self.lock().pulls.clone()
    }

    /// Move a ref behind the orchestrator's back, as another writer would.
    pub fn force_ref(&self, git_ref: &str, sha: &str) {
        self.lock().refs.insert(git_ref.to_string(), sha.to_string());
    }
}

#[async_trait::async_trait]
impl GitHost for MemoryHost {
    async fn repo_exists(&self) -> Result<bool, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::RepoExists)?;
        let exists = s.repo_exists;
        respond(lost, exists)
    }

    async fn create_repo(&self, _description: &str) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreateRepo)?;
        if s.repo_exists {
            return Err(unprocessable(
                HostOp::CreateRepo,
                "name already exists on this account",
            ));
        }
        let branch = s.default_branch.clone();
        s.seed_branch(&branch);
        respond(lost, "memory/sandbox".to_string())
    }

    async fn get_ref(&self, git_ref: &str) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::GetRef)?;
        let sha = s
            .refs
            .get(git_ref)
            .cloned()
            .ok_or_else(|| HostError::status(HostOp::GetRef, 404, "Not Found"))?;
        respond(lost, sha)
    }

    async fn create_ref(&self, git_ref: &str, sha: &str) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreateRef)?;
        if s.refs.contains_key(git_ref) {
            return Err(unprocessable(HostOp::CreateRef, "Reference already exists"));
        }
        if !s.commits.contains_key(sha) {
            return Err(unprocessable(HostOp::CreateRef, "Object does not exist"));
        }
        s.refs.insert(git_ref.to_string(), sha.to_string());
        respond(lost, format!("refs/{git_ref}"))
    }

    async fn get_commit(&self, sha: &str) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::GetCommit)?;
        let tree = s
            .commits
            .get(sha)
            .map(|c| c.tree.clone())
            .ok_or_else(|| HostError::status(HostOp::GetCommit, 404, "Not Found"))?;
        respond(lost, tree)
    }

    async fn create_blob(&self, content: &str) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreateBlob)?;
        let sha = object_sha("blob", content);
        s.blobs.insert(sha.clone(), content.to_string());
        respond(lost, sha)
    }

    async fn write_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreateTree)?;
        let mut files = s
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| unprocessable(HostOp::CreateTree, "Invalid tree info: base_tree"))?;
        for entry in entries {
            if !s.blobs.contains_key(&entry.sha) {
                return Err(unprocessable(HostOp::CreateTree, "Invalid tree info: sha"));
            }
            files.insert(entry.path.clone(), entry.sha.clone());
        }
        let sha = s.put_tree(files);
        respond(lost, sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
        date: OffsetDateTime,
        co_authors: &[String],
    ) -> Result<String, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreateCommit)?;
        if !s.trees.contains_key(tree) {
            return Err(unprocessable(HostOp::CreateCommit, "Tree SHA does not exist"));
        }
        if !s.commits.contains_key(parent) {
            return Err(unprocessable(HostOp::CreateCommit, "Parent SHA does not exist"));
        }
        let full = commit_message_with_trailers(message, co_authors);
        let sha = s.put_commit(tree, vec![parent.to_string()], full, date);
        respond(lost, sha)
    }

    async fn update_ref(&self, git_ref: &str, sha: &str) -> Result<(), HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::UpdateRef)?;
        if !s.refs.contains_key(git_ref) {
            return Err(unprocessable(HostOp::UpdateRef, "Reference does not exist"));
        }
        if !s.commits.contains_key(sha) {
            return Err(unprocessable(HostOp::UpdateRef, "Object does not exist"));
        }
        s.refs.insert(git_ref.to_string(), sha.to_string());
        respond(lost, ())
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<u64, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreateIssue)?;
        s.last_number += 1;
        let number = s.last_number;
        s.issues.push(MemoryIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
        });
        respond(lost, number)
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<u64, HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::CreatePullRequest)?;
        for branch in [head, base] {
            if !s.refs.contains_key(&format!("heads/{branch}")) {
                return Err(unprocessable(HostOp::CreatePullRequest, "Validation Failed"));
            }
        }
        s.last_number += 1;
        let number = s.last_number;
        s.pulls.push(MemoryPull {
            number,
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
            body: body.to_string(),
            merged: false,
        });
        respond(lost, number)
    }

    async fn merge_pull_request(&self, number: u64) -> Result<(), HostError> {
        let mut s = self.lock();
        let lost = s.record(HostOp::MergePullRequest)?;
        let pull = s
            .pulls
            .iter()
            .find(|p| p.number == number && !p.merged)
            .cloned()
            .ok_or_else(|| HostError::status(HostOp::MergePullRequest, 405, "Pull Request is not mergeable"))?;

        let base_ref = format!("heads/{}", pull.base);
        let head_ref = format!("heads/{}", pull.head);
        let (Some(base_sha), Some(head_sha)) =
            (s.refs.get(&base_ref).cloned(), s.refs.get(&head_ref).cloned())
        else {
            return Err(HostError::status(HostOp::MergePullRequest, 405, "Pull Request is not mergeable"));
        };
        let base_tree = s.commits.get(&base_sha).map(|c| c.tree.clone()).unwrap_or_default();
        let head_tree = s.commits.get(&head_sha).map(|c| c.tree.clone()).unwrap_or_default();

        // Files are only ever added or rewritten, so overlaying head on base is the squash result.
        let mut files = s.trees.get(&base_tree).cloned().unwrap_or_default();
        files.extend(s.trees.get(&head_tree).cloned().unwrap_or_default());
        let tree = s.put_tree(files);
        let message = format!("{} (#{number})", pull.title);
        let merged = s.put_commit(&tree, vec![base_sha], message, OffsetDateTime::now_utc());
        s.refs.insert(base_ref, merged);
        if let Some(p) = s.pulls.iter_mut().find(|p| p.number == number) {
            p.merged = true;
        }
        respond(lost, ())
    }
}
