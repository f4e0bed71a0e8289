//! Request identity extraction.
//!
//! Owners are authenticated upstream; the fronting layer forwards the owner
//! id in `X-Owner-Id`. Devices sign their requests; see
//! [`marinelink_domain::RequestAuthenticator`].

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use marinelink_core::CoreError;
use uuid::Uuid;

use crate::error::ApiError;

pub const OWNER_HEADER: &str = "x-owner-id";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const DEVICE_HEADER: &str = "x-device-id";
pub const NEW_KEY_HEADER: &str = "x-new-device-key";

/// Authenticated owner of the request.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Owner)
            .ok_or(ApiError(CoreError::Unauthenticated))
    }
}

/// Signature header value. Missing is unauthenticated.
pub fn signature(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError(CoreError::Unauthenticated))
}

/// `X-Device-Id` header. Missing or malformed is unauthenticated.
pub fn device_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get(DEVICE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(ApiError(CoreError::Unauthenticated))
}
