use thiserror::Error;

use msp_core::ErrorKind;

#[derive(Debug, Error)]
pub enum AgentSvcError {
    #[error("unknown agent id: {0}")]
    UnknownAgent(String),

    #[error("CA error: {0}")]
    Ca(#[from] msp_infra::ca::CaError),

    #[error("tonic transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl AgentSvcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentSvcError::UnknownAgent(_) => ErrorKind::Config,
            AgentSvcError::Ca(_) => ErrorKind::Fatal,
            AgentSvcError::Transport(_) => ErrorKind::TransientNetwork,
        }
    }
}
