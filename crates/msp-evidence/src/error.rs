use thiserror::Error;

use msp_core::ErrorKind;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("canonicalization error: {0}")]
    Canonical(#[from] msp_core::CoreError),

    #[error("io error at {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("submission rejected by control plane: status {status}, body {body}")]
    Rejected { status: u16, body: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvidenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvidenceError::Canonical(e) => e.kind(),
            EvidenceError::Io { .. } => ErrorKind::Fatal,
            EvidenceError::Sqlite(_) => ErrorKind::Fatal,
            EvidenceError::Transport(_) => ErrorKind::TransientNetwork,
            EvidenceError::Rejected { status, .. } if *status == 409 => ErrorKind::Integrity,
            EvidenceError::Rejected { .. } => ErrorKind::TransientNetwork,
            EvidenceError::Json(_) => ErrorKind::Config,
        }
    }
}
