//! HTTP mapping of the core error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use marinelink_command_ledger::LedgerError;
use marinelink_core::CoreError;
use marinelink_domain::DomainError;
use marinelink_fleet_status::FleetError;
use serde_json::json;
use tracing::{debug, error};

#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self.0, "Request failed");
        } else {
            debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        let body = match &self.0 {
            // No detail on authentication failures
            CoreError::Unauthenticated | CoreError::Transient(_) => json!({ "error": self.0.kind() }),
            other => json!({ "error": other.kind(), "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err.into())
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self(err.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Run repository work on the blocking pool.
pub async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(CoreError::Transient(format!("worker: {}", e))))?
}
