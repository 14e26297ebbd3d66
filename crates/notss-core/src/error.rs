use thiserror::Error;

/// Rejected event or policy input, raised before any decision is made.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid state '{0}': expected OK, WARNING, CRITICAL or UNKNOWN")]
    InvalidState(String),

    #[error("invalid state type '{0}': expected SOFT or HARD")]
    InvalidStateType(String),

    #[error("invalid check attempt {0}: attempts start at 1")]
    InvalidAttempt(u32),

    #[error("soft state execution and attempt execution ({0}) are mutually exclusive")]
    ConflictingTriggerPolicy(u32),

    #[error("invalid skip policy '{0}': expected sentinel or empty-only")]
    InvalidSkipPolicy(String),
}

/// Failure of an execution backend as a whole.
///
/// Command-level failures are not errors; they are recorded as a
/// [`Verdict`](crate::types::Verdict) on the command's outcome.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing executable or malformed backend configuration. Nothing ran.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Connect, handshake, host key or authentication failure, or a transport
    /// error mid-batch.
    #[error("connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn connection(host: impl Into<String>, message: impl std::fmt::Display) -> Self {
        BackendError::Connection {
            host: host.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EventError>;
