use thiserror::Error;

use msp_core::ErrorKind;

#[derive(Debug, Error)]
pub enum HealingError {
    #[error("rule store error: {0}")]
    RuleStore(String),

    #[error("l2 planner unreachable: {0}")]
    L2Unreachable(String),

    #[error("l2 planner returned malformed response: {0}")]
    L2Malformed(String),

    #[error("runbook {0} not found in catalog")]
    UnknownRunbook(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] msp_core::CoreError),
}

impl HealingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HealingError::RuleStore(_) => ErrorKind::Config,
            HealingError::L2Unreachable(_) => ErrorKind::TransientNetwork,
            HealingError::L2Malformed(_) => ErrorKind::Config,
            HealingError::UnknownRunbook(_) => ErrorKind::Config,
            HealingError::Sqlite(_) => ErrorKind::Fatal,
            HealingError::Json(_) => ErrorKind::Config,
            HealingError::Core(e) => e.kind(),
        }
    }
}
