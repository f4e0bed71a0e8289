//! Fleet status errors

use marinelink_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Invalid telemetry: {0}")]
    InvalidTelemetry(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<FleetError> for CoreError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::InvalidTelemetry(msg) => CoreError::InvalidPayload(msg),
            FleetError::DatabaseError(e) => CoreError::from(e),
            FleetError::Core(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
