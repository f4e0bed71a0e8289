//! Domain errors

use marinelink_core::CoreError;
use marinelink_crypto::CredentialError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Credential error: {0}")]
    CredentialError(#[from] CredentialError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(what) => CoreError::NotFound(what),
            DomainError::Conflict(what) => CoreError::Conflict(what),
            DomainError::ValidationError(what) => CoreError::InvalidPayload(what),
            DomainError::Unauthenticated => CoreError::Unauthenticated,
            DomainError::DatabaseError(e) => CoreError::from(e),
            DomainError::CredentialError(e) => CoreError::from(e),
            DomainError::Core(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
