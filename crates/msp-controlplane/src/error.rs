//! Error taxonomy for the control plane (spec §7). Wraps `msp_core::ErrorKind`
//! the same way every other crate does, and carries an `IntoResponse` impl
//! since this is the one crate in the workspace that talks HTTP back to a
//! caller instead of just logging and moving on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use msp_core::ErrorKind;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("invalid mac address: {0}")]
    InvalidMac(#[from] msp_types::TypesError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("canonicalization error: {0}")]
    Canonical(#[from] msp_core::CoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("evidence bundle rejected: {0}")]
    Rejected(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ControlPlaneError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlPlaneError::InvalidMac(_) => ErrorKind::Config,
            ControlPlaneError::Sqlite(_) => ErrorKind::Fatal,
            ControlPlaneError::Canonical(e) => e.kind(),
            ControlPlaneError::Io(_) => ErrorKind::Fatal,
            ControlPlaneError::Json(_) => ErrorKind::Config,
            ControlPlaneError::NotFound(_) => ErrorKind::Config,
            ControlPlaneError::Unauthorized(_) => ErrorKind::Auth,
            ControlPlaneError::Rejected(_) => ErrorKind::Integrity,
            ControlPlaneError::BadRequest(_) => ErrorKind::Config,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ControlPlaneError::NotFound(_) => StatusCode::NOT_FOUND,
            ControlPlaneError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ControlPlaneError::Rejected(_) => StatusCode::CONFLICT,
            ControlPlaneError::BadRequest(_) | ControlPlaneError::InvalidMac(_) => StatusCode::BAD_REQUEST,
            ControlPlaneError::Sqlite(_) | ControlPlaneError::Canonical(_) | ControlPlaneError::Io(_) | ControlPlaneError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ControlPlaneError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
