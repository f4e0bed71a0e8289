//! Core error taxonomy
//!
//! Every crate keeps its own error enum and converts into [`CoreError`] at the
//! boundary where a caller needs to decide what to report.

use thiserror::Error;

/// Error kinds visible to callers of the command & presence core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad or missing signature, unknown or inactive device. Carries no detail.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Entity absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, e.g. a pin already in use on the boat
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed JSON or a missing required field
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Broker unreachable, database unavailable
    #[error("transient failure: {0}")]
    Transient(String),
}

impl CoreError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvalidPayload(_) => "invalid_payload",
            CoreError::Transient(_) => "transient",
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Transient(format!("database: {}", err))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Transient(format!("io: {}", err))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidPayload(err.to_string())
    }
}

/// Result alias over [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Returns true when the database error is a UNIQUE / PRIMARY KEY violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_transient() {
        let err: CoreError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.kind(), "transient");
    }

    #[test]
    fn test_unauthenticated_has_no_detail() {
        assert_eq!(CoreError::Unauthenticated.to_string(), "unauthenticated");
    }
}
