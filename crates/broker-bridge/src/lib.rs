//! Broker Bridge for MarineLink
//!
//! One supervised MQTT connection per process.
//!
//! # Outbound
//!
//! Commands are published retained with QoS 1 to `{base}/device/{id}/commands`
//! so a device that connects later still receives the latest one. Acking a
//! command clears the retained message with an empty retained payload.
//! Request handlers never touch the connection: they push onto the
//! [`BridgeHandle`] queue and return.
//!
//! # Inbound
//!
//! - `{base}/device/+/status`: presence
//! - `{base}/device/+/channel/+`: channel state echo
//! - `{base}/boat/+/telemetry`: telemetry samples
//!
//! Every inbound message is handled on a blocking task with its own database
//! connection. Malformed messages are logged and dropped.

pub mod bridge;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod topics;

pub use bridge::{BridgeState, BrokerBridge};
pub use error::BridgeError;
pub use handle::{BridgeHandle, Outbound};
pub use handlers::{InboundHandler, InboundOutcome};
pub use topics::{InboundTopic, Topics};
