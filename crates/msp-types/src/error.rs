use thiserror::Error;

/// Errors raised constructing or validating domain types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
