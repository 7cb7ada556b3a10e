use thiserror::Error;

use msp_core::ErrorKind;

#[derive(Debug, Error)]
pub enum ApplianceError {
    #[error("config error: {0}")]
    Config(#[from] msp_infra::ConfigError),

    #[error("ca/key error: {0}")]
    Ca(#[from] msp_infra::ca::CaError),

    #[error("signing key error: {0}")]
    Key(#[from] msp_infra::keys::KeyError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("healing error: {0}")]
    Healing(#[from] msp_healing::HealingError),

    #[error("evidence error: {0}")]
    Evidence(#[from] msp_evidence::EvidenceError),

    #[error("checkin request failed: {0}")]
    Checkin(#[from] reqwest::Error),

    #[error("agent service error: {0}")]
    AgentSvc(#[from] msp_agentsvc::AgentSvcError),
}

impl ApplianceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplianceError::Config(_) => ErrorKind::Config,
            ApplianceError::Ca(_) => ErrorKind::Fatal,
            ApplianceError::Key(_) => ErrorKind::Fatal,
            ApplianceError::Sqlite(_) => ErrorKind::Fatal,
            ApplianceError::Healing(e) => e.kind(),
            ApplianceError::Evidence(e) => e.kind(),
            ApplianceError::Checkin(_) => ErrorKind::TransientNetwork,
            ApplianceError::AgentSvc(e) => e.kind(),
        }
    }
}
