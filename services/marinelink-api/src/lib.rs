//! MarineLink API service
//!
//! HTTP surface of the device command & presence core:
//! - device-facing pull/ack/telemetry endpoints authenticated by HMAC
//! - owner-facing boat, channel, device and telemetry endpoints
//!
//! The binary wires these routes together with the broker bridge and the
//! realtime websocket feed.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
