use serde::Serialize;

/// Head of one branch as last confirmed by the run.
///
/// `head_commit_sha` is the parent of the next commit and `base_tree_sha` is
/// its tree. Both move together, and only after the ref update that made the
/// new commit reachable has been confirmed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GitChainState {
    pub branch_ref: String,
    pub head_commit_sha: String,
    pub base_tree_sha: String,
}

impl GitChainState {
    pub fn new(branch_ref: &str, head_commit_sha: String, base_tree_sha: String) -> Self {
        Self {
            branch_ref: branch_ref.to_string(),
            head_commit_sha,
            base_tree_sha,
        }
    }

    /// Same head, tracked under another ref (a fresh feature branch).
    pub fn fork(&self, branch_ref: &str) -> Self {
        Self::new(
            branch_ref,
            self.head_commit_sha.clone(),
            self.base_tree_sha.clone(),
        )
    }

    pub fn advance(&mut self, commit_sha: String, tree_sha: String) {
        self.head_commit_sha = commit_sha;
        self.base_tree_sha = tree_sha;
    }

    /// First seven characters of the head, for log lines.
    pub fn short_head(&self) -> &str {
        short_sha(&self.head_commit_sha)
    }
}

pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
