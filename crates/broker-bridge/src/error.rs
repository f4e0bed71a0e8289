//! Broker bridge errors

use marinelink_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Broker refused connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),
}

impl From<BridgeError> for CoreError {
    fn from(err: BridgeError) -> Self {
        CoreError::Transient(err.to_string())
    }
}
