use thiserror::Error;

/// The error taxonomy shared by every component (spec §7). Each crate that
/// needs its own flavor wraps one of these kinds rather than inventing a
/// parallel taxonomy, so the appliance main loop can pattern-match on kind
/// alone regardless of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientNetwork,
    Auth,
    Timeout,
    Config,
    Integrity,
    PolicyBlocked,
    Capacity,
    Fatal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("rule match error: {0}")]
    RuleMatch(String),

    #[error("invalid regex in rule condition: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Canonicalization(_) => ErrorKind::Integrity,
            CoreError::RuleMatch(_) => ErrorKind::Config,
            CoreError::InvalidPattern(_) => ErrorKind::Config,
            CoreError::Json(_) => ErrorKind::Config,
        }
    }
}
