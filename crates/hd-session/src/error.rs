use hd_core::types::AgentRole;
use thiserror::Error;
use uuid::Uuid;

use crate::daemon::DaemonError;
use crate::guard::GuardViolation;
use crate::persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store has not been restored yet")]
    NotRestored,

    #[error("terminal instance not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Guard(#[from] GuardViolation),

    #[error("expected a {expected} agent, got {actual}")]
    InvalidRole {
        expected: AgentRole,
        actual: AgentRole,
    },

    #[error("terminal {0} has no running process")]
    NotLaunched(Uuid),

    #[error("launch for terminal {id} is stale (generation {reported}, now {current})")]
    StaleLaunch {
        id: Uuid,
        reported: u32,
        current: u32,
    },

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
