//! Request Authenticator
//!
//! Verifies device-originated requests: HMAC-SHA256 over the exact raw body,
//! keyed with the device's unprotected key, compared in constant time.
//!
//! Every failure (unknown device, inactive device, unreadable key, bad
//! signature) collapses into the same [`DomainError::Unauthenticated`]. The
//! specific reason is only logged at debug level.

use marinelink_crypto::{ack_signing_string, verify_hex};
use tracing::debug;

use crate::devices::DeviceRegistry;
use crate::error::{DomainError, Result};
use crate::model::{BoatId, DeviceId};

/// A device whose request signature checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedDevice {
    pub device_id: DeviceId,
    pub boat_id: BoatId,
}

#[derive(Clone)]
pub struct RequestAuthenticator {
    registry: DeviceRegistry,
}

impl RequestAuthenticator {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    /// Verify `signature_hex` over `raw_body` for `device_id`.
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature_hex: &str,
        device_id: DeviceId,
    ) -> Result<AuthenticatedDevice> {
        let credential = match self.registry.credential(device_id) {
            Ok(Some(c)) => c,
            Ok(None) => {
                debug!(device_id = %device_id, "auth: unknown device");
                return Err(DomainError::Unauthenticated);
            }
            // A storage failure is not an authentication verdict
            Err(e) => return Err(e),
        };

        if !credential.is_active {
            debug!(device_id = %device_id, "auth: inactive device");
            return Err(DomainError::Unauthenticated);
        }

        let key = match self
            .registry
            .credential_store()
            .unprotect(&credential.key_protected)
        {
            Ok(key) => key,
            Err(e) => {
                debug!(device_id = %device_id, error = %e, "auth: key unreadable");
                return Err(DomainError::Unauthenticated);
            }
        };

        if !verify_hex(key.as_bytes(), raw_body, signature_hex) {
            debug!(device_id = %device_id, "auth: signature mismatch");
            return Err(DomainError::Unauthenticated);
        }

        Ok(AuthenticatedDevice {
            device_id,
            boat_id: credential.boat_id,
        })
    }

    /// Verify an acknowledgment. The signature covers the canonical
    /// `{"id":<command_id>}` string, not the request body.
    pub fn verify_ack(
        &self,
        device_id: DeviceId,
        command_id: i64,
        signature_hex: &str,
    ) -> Result<AuthenticatedDevice> {
        let canonical = ack_signing_string(command_id);
        self.verify(canonical.as_bytes(), signature_hex, device_id)
    }
}
