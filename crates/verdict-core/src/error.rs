use crate::types::Version;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VerdictError>;

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("Model not found: {name}")]
    ModelNotFound { name: String },

    #[error("Model version not found: {name}@{version}")]
    VersionNotFound { name: String, version: Version },

    #[error("Model {name}@{version} already exists; model versions cannot be updated")]
    Conflict { name: String, version: Version },

    #[error("Model {name} has no version numbers left to allocate")]
    VersionsExhausted { name: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error on field '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

impl VerdictError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for the variants a caller maps onto "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModelNotFound { .. } | Self::VersionNotFound { .. })
    }
}

impl From<serde_json::Error> for VerdictError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
