//! Live-push seam between the ledger and the broker bridge.

use thiserror::Error;
use uuid::Uuid;

use crate::command_types::CommandEnvelope;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Broker disconnected, outbound queue full or bridge stopped
    #[error("publisher unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Best-effort push of commands to devices.
///
/// Implementations must not block: the ledger calls them from request
/// handlers after the durable write has committed, and a failure is only
/// logged.
pub trait CommandPublisher: Send + Sync {
    /// Publish `envelope` as the retained command for `device_id`.
    fn publish(&self, device_id: Uuid, envelope: &CommandEnvelope) -> Result<(), PublishError>;

    /// Remove the retained command for `device_id`.
    fn clear_retained(&self, device_id: Uuid) -> Result<(), PublishError>;
}

/// Publisher used when no broker is configured. Devices rely on polling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl CommandPublisher for NoopPublisher {
    fn publish(&self, _device_id: Uuid, _envelope: &CommandEnvelope) -> Result<(), PublishError> {
        Ok(())
    }

    fn clear_retained(&self, _device_id: Uuid) -> Result<(), PublishError> {
        Ok(())
    }
}
