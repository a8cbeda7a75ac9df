use cadence_core::{ConfigError, SimulationStatus};
use cadence_host::{HostError, HostOp};

/// Why a run stopped in `ERROR` (or why a control call was refused).
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("{context}: {source}")]
    Host {
        op: HostOp,
        context: String,
        #[source]
        source: HostError,
    },

    #[error("repository {0} does not exist and auto_create_repo is off")]
    RepositoryMissing(String),

    /// The ref was re-read after an unacknowledged update and points elsewhere.
    #[error("{git_ref} is at {observed}, expected {expected} after update")]
    RefDiverged {
        git_ref: String,
        expected: String,
        observed: String,
    },

    #[error("invalid transition: {from} → {to}")]
    InvalidTransition {
        from: SimulationStatus,
        to: SimulationStatus,
    },

    #[error("run cannot resume from {0}")]
    NotResumable(SimulationStatus),
}

impl RunError {
    /// Wrap a host failure with what the run was doing at the time.
    pub fn host(context: impl Into<String>, source: HostError) -> Self {
        RunError::Host {
            op: source.op(),
            context: context.into(),
            source,
        }
    }

    pub fn host_op(&self) -> Option<HostOp> {
        match self {
            RunError::Host { op, .. } => Some(*op),
            _ => None,
        }
    }
}
