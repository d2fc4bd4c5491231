use thiserror::Error;

/// Top-level errors. Only programmer-supplied misconfiguration is allowed to
/// reach the caller as a hard failure; everything target-local is absorbed at
/// the target boundary and expressed as capacity signals.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("command queue is empty; at least one command is required")]
    EmptyQueue,

    #[error("no dispatch targets configured")]
    NoTargets,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Why a capacity probe produced no usable value. Both kinds are treated as
/// capacity 0 by the dispatcher; the distinction exists for logging and for
/// callers that want to branch on it.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("malformed probe response: {0:?}")]
    Malformed(String),
}

/// Why a dispatch attempt failed after the target reported capacity.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("session could not be established: {0}")]
    Unreachable(String),

    #[error("remote execution failed: {0}")]
    ExecFailed(String),

    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Session-level failures, mapped into `ProbeError`/`StartError` at the
/// target boundary.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connection to {host} failed: {reason}")]
    ConnectFailed { host: String, reason: String },

    #[error("command timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("remote command exited with status {status}")]
    ExecFailed { status: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
