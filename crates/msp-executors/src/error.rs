use thiserror::Error;

/// Error conditions a remote execution can fail with (spec §4.1). Only
/// `Connection` and `Timeout` are retried by the caller; `Auth` is
/// terminal for the current attempt and invalidates the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("auth failure")]
    Auth,
    #[error("timeout after {0}s")]
    Timeout(u64),
    #[error("remote command exited non-zero: {0}")]
    RemoteExitNonzero(i32),
    #[error("failed to parse remote output: {0}")]
    Parse(String),
}

impl ExecutorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutorError::Connection(_) | ExecutorError::Timeout(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutorError::Connection(_) => "connection",
            ExecutorError::Auth => "auth",
            ExecutorError::Timeout(_) => "timeout",
            ExecutorError::RemoteExitNonzero(_) => "remote-exit-nonzero",
            ExecutorError::Parse(_) => "parse",
        }
    }
}
