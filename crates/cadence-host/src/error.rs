use serde::Serialize;

/// Remote operations, named as they appear in run logs.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum HostOp {
    RepoExists,
    CreateRepo,
    GetRef,
    CreateRef,
    GetCommit,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    CreateIssue,
    CreatePullRequest,
    MergePullRequest,
}

impl HostOp {
    pub fn name(self) -> &'static str {
        match self {
            HostOp::RepoExists => "repoExists",
            HostOp::CreateRepo => "createRepo",
            HostOp::GetRef => "getRef",
            HostOp::CreateRef => "createRef",
            HostOp::GetCommit => "getCommit",
            HostOp::CreateBlob => "createBlob",
            HostOp::CreateTree => "createTree",
            HostOp::CreateCommit => "createCommit",
            HostOp::UpdateRef => "updateRef",
            HostOp::CreateIssue => "createIssue",
            HostOp::CreatePullRequest => "createPullRequest",
            HostOp::MergePullRequest => "mergePullRequest",
        }
    }

    /// Reads with no side effects; the only calls that may be retried.
    pub fn is_read(self) -> bool {
        matches!(self, HostOp::RepoExists | HostOp::GetRef | HostOp::GetCommit)
    }
}

impl std::fmt::Display for HostOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("{op} failed with HTTP {status}: {message}")]
    Status {
        op: HostOp,
        status: u16,
        message: String,
    },
    /// Transport failure or timeout; no HTTP status was received.
    #[error("{op} failed: host unavailable: {message}")]
    Unavailable { op: HostOp, message: String },
    #[error("{op} failed: malformed request or response: {message}")]
    Protocol { op: HostOp, message: String },
}

impl HostError {
    pub fn status(op: HostOp, status: u16, message: impl Into<String>) -> Self {
        HostError::Status {
            op,
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(op: HostOp, message: impl Into<String>) -> Self {
        HostError::Unavailable {
            op,
            message: message.into(),
        }
    }

    pub fn op(&self) -> HostOp {
        match self {
            HostError::Status { op, .. }
            | HostError::Unavailable { op, .. }
            | HostError::Protocol { op, .. } => *op,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            HostError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            HostError::Status { message, .. }
            | HostError::Unavailable { message, .. }
            | HostError::Protocol { message, .. } => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }

    /// Worth another attempt: transport failures, server errors, conflicts
    /// (an empty repository right after creation) and rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            HostError::Unavailable { .. } => true,
            HostError::Status { status, .. } => {
                *status >= 500 || *status == 409 || *status == 429
            }
            HostError::Protocol { .. } => false,
        }
    }
}
